//! ZTMC Enforcement - The policy enforcement point
//!
//! The orchestrator of the pipeline: validates the request, asks the
//! decision point for a verdict, applies it, dispatches remediation for
//! non-ALLOW outcomes and writes the audit record. Once the decision point
//! has answered, the decision is authoritative — remediation and monitoring
//! failures degrade telemetry, never the returned outcome.

#![deny(unsafe_code)]

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use ztmc_monitor::CentralMonitor;
use ztmc_policy::DecisionPoint;
use ztmc_remediation::Remediator;
use ztmc_types::{AccessRequest, CloudProvider, Decision, EnforcementOutcome, EventRecord};

/// The policy enforcement point.
pub struct EnforcementPoint {
    pdp: Arc<DecisionPoint>,
    remediator: Arc<Remediator>,
    monitor: Arc<CentralMonitor>,
}

impl EnforcementPoint {
    pub fn new(
        pdp: Arc<DecisionPoint>,
        remediator: Arc<Remediator>,
        monitor: Arc<CentralMonitor>,
    ) -> Self {
        Self {
            pdp,
            remediator,
            monitor,
        }
    }

    /// Run one request through the full pipeline.
    ///
    /// Malformed requests are rejected before the decision point and leave
    /// no access-request audit record. Every well-formed request produces a
    /// decision, exactly one ACCESS_REQUEST record, and — for DENY/REVIEW —
    /// a remediation dispatch.
    pub async fn enforce(
        &self,
        request: AccessRequest,
    ) -> Result<EnforcementOutcome, EnforcementError> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(EnforcementError::MalformedRequest { fields: missing });
        }

        let verdict = self.pdp.decide(&request);
        let cloud = CloudProvider::classify(&request.resource);

        match verdict.decision {
            Decision::Allow => info!(
                user = %request.user,
                resource = %request.resource,
                reason = %verdict.reason,
                "access granted"
            ),
            Decision::Deny => info!(
                user = %request.user,
                resource = %request.resource,
                reason = %verdict.reason,
                "access blocked"
            ),
            // Blocked pending manual inspection; distinguished in the audit
            // trail but enforced like a deny.
            Decision::Review => info!(
                user = %request.user,
                resource = %request.resource,
                reason = %verdict.reason,
                "access held for manual review"
            ),
        }

        let remediation_actions = if verdict.decision.is_allow() {
            Vec::new()
        } else {
            self.remediator
                .remediate(
                    &request.user,
                    &request.resource,
                    verdict.decision,
                    &verdict.reason,
                    cloud,
                )
                .await
        };

        let record =
            EventRecord::access_request(&request, cloud, verdict.decision, verdict.reason.clone());
        if let Err(err) = self.monitor.record(record).await {
            // Degraded but non-fatal: the decision stands, the alarm is the
            // operator's signal.
            error!(error = %err, user = %request.user, "failed to record access event");
        }

        Ok(EnforcementOutcome {
            request,
            decision: verdict.decision,
            reason: verdict.reason,
            cloud,
            remediation_actions,
        })
    }
}

/// Enforcement errors. The only failure a caller can see is a request that
/// never entered the pipeline.
#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("malformed access request, missing fields: {fields:?}")]
    MalformedRequest { fields: Vec<&'static str> },
}
