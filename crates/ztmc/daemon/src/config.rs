//! Configuration for the ZTMC daemon.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use ztmc_policy::TrustConfig;

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZtmcConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Contextual trust configuration (networks, devices, hours)
    #[serde(default)]
    pub trust: TrustConfig,

    /// Policy document configuration
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Remediation configuration
    #[serde(default)]
    pub remediation: RemediationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ZtmcConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            trust: TrustConfig::default(),
            policy: PolicyConfig::default(),
            audit: AuditConfig::default(),
            remediation: RemediationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8089".parse().expect("valid default address"),
        }
    }
}

/// Policy document configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Path of the policy document (JSON)
    #[serde(default = "default_policy_path")]
    pub path: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: default_policy_path(),
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Append-only event log (JSONL)
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Metrics cache side file; empty disables the cache file
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// Remediation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationConfig {
    /// Upper bound for one cloud adapter call, in seconds
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_secs: u64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: default_adapter_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_policy_path() -> String {
    "policies.json".to_string()
}

fn default_log_path() -> String {
    "ztmc_events.jsonl".to_string()
}

fn default_metrics_path() -> String {
    "ztmc_metrics.json".to_string()
}

fn default_adapter_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ZtmcConfig {
    /// Load configuration: defaults, then an optional file, then `ZTMC_`
    /// environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ZtmcConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ZTMC")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
