//! ZTMC Remediation - Auto-remediation dispatcher
//!
//! Maps a non-ALLOW decision plus a target cloud to corrective actions via
//! the pluggable [`CloudAdapter`] capability set, and records one
//! REMEDIATION audit event per call. Adapter calls are the only external
//! I/O in the pipeline, so each one is bounded by a timeout and never holds
//! a shared lock while outstanding.

#![deny(unsafe_code)]

mod adapters;

pub use adapters::{AdapterError, AwsAdapter, AzureAdapter, CloudAdapter, GcpAdapter};

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ztmc_monitor::CentralMonitor;
use ztmc_types::{CloudProvider, Decision, EventRecord};

const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches corrective actions for DENY and REVIEW decisions.
pub struct Remediator {
    adapters: Vec<Arc<dyn CloudAdapter>>,
    monitor: Arc<CentralMonitor>,
    adapter_timeout: Duration,
}

impl Remediator {
    /// Remediator over the three stub adapters.
    pub fn new(monitor: Arc<CentralMonitor>) -> Self {
        Self::with_adapters(
            monitor,
            vec![
                Arc::new(AwsAdapter) as Arc<dyn CloudAdapter>,
                Arc::new(AzureAdapter),
                Arc::new(GcpAdapter),
            ],
        )
    }

    /// Remediator over an explicit adapter set (tests, partial deployments).
    pub fn with_adapters(monitor: Arc<CentralMonitor>, adapters: Vec<Arc<dyn CloudAdapter>>) -> Self {
        Self {
            adapters,
            monitor,
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Dispatch remediation for one decision and return the action
    /// descriptions, in order.
    ///
    /// Never fails: adapter errors and timeouts are captured as failure
    /// descriptions, and a monitor outage only costs the REMEDIATION audit
    /// record, which is logged as degraded operation. Safe to retry; the
    /// stub adapters have no external side effects.
    pub async fn remediate(
        &self,
        user: &str,
        resource: &str,
        decision: Decision,
        reason: &str,
        cloud: CloudProvider,
    ) -> Vec<String> {
        let mut actions = Vec::new();

        match decision {
            Decision::Deny => match self.adapter_for(cloud) {
                Some(adapter) => {
                    actions.push(self.revoke(adapter.as_ref(), user, cloud).await);
                }
                None => {
                    // Unmatched clouds are not remediated.
                    warn!(cloud = %cloud, user, "no adapter registered, skipping revocation");
                }
            },
            Decision::Review => {
                actions.push(format!(
                    "admin review needed for {user} on {resource}: {reason}"
                ));
            }
            Decision::Allow => {
                // Callers only dispatch non-ALLOW decisions.
                warn!(user, "remediate called for an ALLOW decision, nothing to do");
                return actions;
            }
        }

        info!(
            user,
            resource,
            decision = %decision,
            cloud = %cloud,
            actions = actions.len(),
            "remediation dispatched"
        );

        let record =
            EventRecord::remediation(user, resource, cloud, decision, reason, actions.clone());
        if let Err(err) = self.monitor.record(record).await {
            warn!(error = %err, user, "failed to record remediation event, continuing degraded");
        }

        actions
    }

    fn adapter_for(&self, cloud: CloudProvider) -> Option<&Arc<dyn CloudAdapter>> {
        self.adapters.iter().find(|a| a.provider() == cloud)
    }

    async fn revoke(&self, adapter: &dyn CloudAdapter, user: &str, cloud: CloudProvider) -> String {
        match tokio::time::timeout(self.adapter_timeout, adapter.revoke_access(user)).await {
            Ok(Ok(description)) => description,
            Ok(Err(err)) => {
                warn!(cloud = %cloud, user, error = %err, "adapter revocation failed");
                format!("{cloud} remediation failed for {user}: {err}")
            }
            Err(_) => {
                warn!(cloud = %cloud, user, timeout = ?self.adapter_timeout, "adapter revocation timed out");
                format!(
                    "{cloud} remediation timed out for {user} after {}s",
                    self.adapter_timeout.as_secs()
                )
            }
        }
    }
}
