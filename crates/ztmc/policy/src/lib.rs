//! ZTMC Policy - The policy decision point
//!
//! Combines contextual trust checks with action-based policy lookups into a
//! single zero-trust access decision. Evaluation is side-effect-free and
//! safe for unlimited concurrent invocation; the only shared state is the
//! read-only policy snapshot.

#![deny(unsafe_code)]

mod context;
mod store;

pub use context::{ContextEvaluator, TrustConfig};
pub use store::{Policy, PolicyConditions, PolicySet, PolicyStore};

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use ztmc_types::{AccessRequest, ContextVerdict, Decision, PolicyDecision};

/// Deny-overrides combination of the context and action decisions.
///
/// Any denying signal forces DENY. Context REVIEW downgrades an action ALLOW
/// to REVIEW. Every remaining combination — including context ALLOW with
/// action REVIEW — fails closed to DENY; that asymmetry is deliberate,
/// observable behavior.
pub fn combine(context: Decision, action: Decision) -> Decision {
    if context == Decision::Deny || action == Decision::Deny {
        return Decision::Deny;
    }
    match (context, action) {
        (Decision::Review, Decision::Allow) => Decision::Review,
        (Decision::Allow, Decision::Allow) => Decision::Allow,
        _ => Decision::Deny,
    }
}

/// A fully resolved access decision with both contributing verdicts.
#[derive(Clone, Debug)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: String,
    pub context: ContextVerdict,
    pub action: PolicyDecision,
}

/// The policy decision point: context evaluator + policy store.
pub struct DecisionPoint {
    store: Arc<PolicyStore>,
    context: ContextEvaluator,
}

impl DecisionPoint {
    pub fn new(store: Arc<PolicyStore>, context: ContextEvaluator) -> Self {
        Self { store, context }
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Evaluate one request. Idempotent and side-effect-free; callable
    /// concurrently from any number of requests.
    ///
    /// The combined reason is the one belonging to whichever side determined
    /// the final decision, preferring the context reason when both sides
    /// agree (context is the higher-priority signal).
    pub fn decide(&self, request: &AccessRequest) -> Verdict {
        let set = self.store.snapshot();
        let context = self.context.evaluate(request);
        let action = set.evaluate(&request.action);
        let decision = combine(context.decision, action.decision);

        let reason = if decision == context.decision {
            context.reason.clone()
        } else {
            action.reason.clone()
        };

        debug!(
            user = %request.user,
            action = %request.action,
            context = %context.decision,
            policy = %action.decision,
            decision = %decision,
            "access decision"
        );

        Verdict {
            decision,
            reason,
            context,
            action,
        }
    }
}

/// Policy-related errors. Evaluation itself never fails for well-formed
/// input; these cover loading and reloading the policy document.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("no policy source configured for reload")]
    NoSource,

    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse policy file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone, Utc};
    use proptest::prelude::*;

    fn any_decision() -> impl Strategy<Value = Decision> {
        prop_oneof![
            Just(Decision::Allow),
            Just(Decision::Review),
            Just(Decision::Deny),
        ]
    }

    #[test]
    fn deny_overrides_everything() {
        for d in [Decision::Allow, Decision::Review, Decision::Deny] {
            assert_eq!(combine(Decision::Deny, d), Decision::Deny);
            assert_eq!(combine(d, Decision::Deny), Decision::Deny);
        }
    }

    #[test]
    fn combine_table_is_exact() {
        assert_eq!(combine(Decision::Review, Decision::Allow), Decision::Review);
        assert_eq!(combine(Decision::Allow, Decision::Allow), Decision::Allow);
        // Fail-closed asymmetry: an uncertain action under a clean context
        // does NOT mirror the review path.
        assert_eq!(combine(Decision::Allow, Decision::Review), Decision::Deny);
        assert_eq!(combine(Decision::Review, Decision::Review), Decision::Deny);
    }

    proptest! {
        #[test]
        fn property_allow_requires_both_sides_clean(
            context in any_decision(),
            action in any_decision(),
        ) {
            let combined = combine(context, action);
            // Deny on either side always wins.
            if context == Decision::Deny || action == Decision::Deny {
                prop_assert_eq!(combined, Decision::Deny);
            }
            // Allow is only reachable when both sides allow.
            if combined == Decision::Allow {
                prop_assert_eq!(context, Decision::Allow);
                prop_assert_eq!(action, Decision::Allow);
            }
            // The result is never laxer than the context signal.
            prop_assert!(combined >= context.min(action));
        }
    }

    fn business_hours_request(ip: &str, device: &str, action: &str) -> AccessRequest {
        let mut req = AccessRequest::new("alice", action, "arn:aws:s3:::bucket", ip, device);
        req.request_time = Local
            .with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
            .single()
            .expect("unambiguous local time")
            .with_timezone(&Utc);
        req
    }

    fn decision_point(set: PolicySet) -> DecisionPoint {
        DecisionPoint::new(
            Arc::new(PolicyStore::from_set(set)),
            ContextEvaluator::default(),
        )
    }

    fn allow_reads_set() -> PolicySet {
        PolicySet {
            policies: vec![Policy {
                conditions: PolicyConditions {
                    action: vec!["s3:getobject".to_string()],
                },
                decision: Decision::Allow,
                description: "object storage reads are permitted".to_string(),
            }],
            default_decision: Decision::Deny,
        }
    }

    #[test]
    fn clean_context_and_matching_allow_policy_allows() {
        let pdp = decision_point(allow_reads_set());
        let verdict = pdp.decide(&business_hours_request(
            "192.168.1.12",
            "device-laptop-001",
            "s3:GetObject",
        ));
        assert_eq!(verdict.decision, Decision::Allow);
        assert_eq!(verdict.reason, "context validated");
    }

    #[test]
    fn context_deny_wins_regardless_of_action_policy() {
        let pdp = decision_point(allow_reads_set());
        let verdict = pdp.decide(&business_hours_request(
            "8.8.8.8",
            "device-laptop-001",
            "s3:GetObject",
        ));
        assert_eq!(verdict.decision, Decision::Deny);
        assert!(verdict.reason.starts_with("untrusted network source"));
    }

    #[test]
    fn unknown_device_with_allowed_action_goes_to_review() {
        let pdp = decision_point(allow_reads_set());
        let verdict = pdp.decide(&business_hours_request(
            "10.0.7.7",
            "unknown-device-999",
            "s3:GetObject",
        ));
        assert_eq!(verdict.decision, Decision::Review);
        assert!(verdict.reason.starts_with("unrecognized device"));
    }

    #[test]
    fn unmatched_action_surfaces_the_default_reason() {
        let pdp = decision_point(PolicySet {
            policies: Vec::new(),
            default_decision: Decision::Deny,
        });
        let verdict = pdp.decide(&business_hours_request(
            "192.168.1.12",
            "device-laptop-001",
            "kms:Decrypt",
        ));
        assert_eq!(verdict.decision, Decision::Deny);
        assert_eq!(verdict.reason, "no matching policy (default)");
    }

    #[test]
    fn review_action_under_clean_context_fails_closed_with_action_reason() {
        let pdp = decision_point(PolicySet {
            policies: vec![Policy {
                conditions: PolicyConditions {
                    action: vec!["iam:*".to_string()],
                },
                decision: Decision::Review,
                description: "identity changes need review".to_string(),
            }],
            default_decision: Decision::Deny,
        });
        let verdict = pdp.decide(&business_hours_request(
            "192.168.1.12",
            "device-laptop-001",
            "iam:PassRole",
        ));
        assert_eq!(verdict.decision, Decision::Deny);
        assert_eq!(verdict.reason, "identity changes need review");
    }
}
