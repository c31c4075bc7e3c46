//! Server setup and lifecycle management.

use crate::api::{create_router, AppState};
use crate::config::ZtmcConfig;
use crate::error::DaemonResult;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use ztmc_enforcement::EnforcementPoint;
use ztmc_monitor::CentralMonitor;
use ztmc_policy::{ContextEvaluator, DecisionPoint, PolicyStore};
use ztmc_remediation::Remediator;

/// ZTMC daemon server: wires the pipeline and serves the API.
pub struct Server {
    config: ZtmcConfig,
    state: AppState,
}

impl Server {
    /// Build the pipeline from configuration.
    ///
    /// A missing or unparsable policy document is fatal here: the daemon
    /// must not serve requests without a policy. The monitor replays the
    /// existing event log so metrics survive a crash.
    pub async fn new(config: ZtmcConfig) -> DaemonResult<Self> {
        let policy_store = Arc::new(PolicyStore::load(&config.policy.path)?);

        let metrics_path = if config.audit.metrics_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&config.audit.metrics_path))
        };
        let monitor = Arc::new(CentralMonitor::open(&config.audit.log_path, metrics_path).await?);

        let pdp = Arc::new(DecisionPoint::new(
            Arc::clone(&policy_store),
            ContextEvaluator::new(config.trust.clone()),
        ));
        let remediator = Arc::new(
            Remediator::new(Arc::clone(&monitor))
                .with_timeout(Duration::from_secs(config.remediation.adapter_timeout_secs)),
        );
        let enforcement = Arc::new(EnforcementPoint::new(
            pdp,
            remediator,
            Arc::clone(&monitor),
        ));

        let state = AppState::new(enforcement, monitor, policy_store);
        Ok(Self { config, state })
    }

    /// Run the server until ctrl-c or SIGTERM.
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("ztmc daemon listening on {}", addr);
        tracing::info!(
            policy = %self.config.policy.path,
            audit_log = %self.config.audit.log_path,
            "pipeline ready"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::error::DaemonError::Server(e.to_string()))?;

        tracing::info!("ztmc daemon shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditConfig, PolicyConfig};

    #[tokio::test]
    async fn startup_fails_without_a_policy_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = ZtmcConfig {
            policy: PolicyConfig {
                path: dir
                    .path()
                    .join("missing.json")
                    .display()
                    .to_string(),
            },
            ..ZtmcConfig::default()
        };
        assert!(Server::new(config).await.is_err());
    }

    #[tokio::test]
    async fn startup_wires_the_pipeline_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = dir.path().join("policies.json");
        std::fs::write(
            &policy_path,
            serde_json::json!({
                "policies": [{
                    "conditions": {"action": ["s3:getobject"]},
                    "decision": "allow",
                    "description": "read"
                }],
                "default_action": "deny"
            })
            .to_string(),
        )
        .unwrap();

        let config = ZtmcConfig {
            policy: PolicyConfig {
                path: policy_path.display().to_string(),
            },
            audit: AuditConfig {
                log_path: dir.path().join("events.jsonl").display().to_string(),
                metrics_path: dir.path().join("metrics.json").display().to_string(),
            },
            ..ZtmcConfig::default()
        };

        let server = Server::new(config).await.unwrap();
        assert_eq!(server.state.monitor.snapshot().await.total_access_requests, 0);
        assert_eq!(server.state.policy_store.snapshot().policies.len(), 1);
    }
}
