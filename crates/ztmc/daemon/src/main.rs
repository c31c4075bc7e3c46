//! ZTMC Daemon - Zero-trust access enforcement service
//!
//! The daemon provides:
//! - The request entry point (`POST /v1/access`) returning decision + reason
//! - A metrics snapshot and audit trail query surface
//! - Policy hot-reload with last-known-good fallback
//! - A durable, replayable audit trail

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;

use config::ZtmcConfig;
use error::DaemonResult;
use server::Server;

/// ZTMC Daemon CLI
#[derive(Parser)]
#[command(name = "ztmcd")]
#[command(about = "ZTMC Daemon - Zero-trust access enforcement service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ZTMC_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "ZTMC_LISTEN_ADDR")]
    listen: Option<String>,

    /// Policy document path
    #[arg(short, long, env = "ZTMC_POLICY_PATH")]
    policy: Option<String>,

    /// Log level
    #[arg(long, env = "ZTMC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "ZTMC_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config = ZtmcConfig::load(cli.config.as_deref())
        .map_err(|e| error::DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| error::DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(policy) = cli.policy {
        config.policy.path = policy;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        policy = %config.policy.path,
        "starting ztmc daemon"
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await
}
