//! Contextual trust checks: network, time-of-day, device.

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};
use ztmc_types::{AccessRequest, ContextVerdict, Decision};

/// Static trust configuration for contextual evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrustConfig {
    /// IP prefixes considered on-network, matched with `starts_with`.
    pub trusted_networks: Vec<String>,
    /// Device allow-list, matched exactly.
    pub trusted_devices: Vec<String>,
    /// Half-open `[start, end)` hour-of-day window in the deployment's
    /// local time.
    pub business_hours: (u32, u32),
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            trusted_networks: vec!["192.168.".to_string(), "10.0.".to_string()],
            trusted_devices: vec![
                "device-laptop-001".to_string(),
                "device-admin-001".to_string(),
            ],
            business_hours: (8, 20),
        }
    }
}

/// Stateless evaluator of the contextual trust signals.
///
/// Check order is part of the contract: network, then hours, then device.
/// The first failing check short-circuits with its reason, so a request that
/// fails several checks always reports the highest-priority one.
#[derive(Clone, Debug)]
pub struct ContextEvaluator {
    config: TrustConfig,
}

impl ContextEvaluator {
    pub fn new(config: TrustConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Pure function of the request and the static trust configuration.
    pub fn evaluate(&self, request: &AccessRequest) -> ContextVerdict {
        if !self.in_trusted_network(&request.source_ip) {
            return ContextVerdict {
                decision: Decision::Deny,
                reason: format!("untrusted network source ({})", request.source_ip),
            };
        }

        if !self.within_business_hours(request) {
            return ContextVerdict {
                decision: Decision::Deny,
                reason: "outside business hours".to_string(),
            };
        }

        if !self.is_trusted_device(&request.device_id) {
            return ContextVerdict {
                decision: Decision::Review,
                reason: format!("unrecognized device ({})", request.device_id),
            };
        }

        ContextVerdict {
            decision: Decision::Allow,
            reason: "context validated".to_string(),
        }
    }

    fn in_trusted_network(&self, ip: &str) -> bool {
        self.config
            .trusted_networks
            .iter()
            .any(|prefix| ip.starts_with(prefix.as_str()))
    }

    fn within_business_hours(&self, request: &AccessRequest) -> bool {
        let (start, end) = self.config.business_hours;
        let hour = request.request_time.with_timezone(&Local).hour();
        start <= hour && hour < end
    }

    fn is_trusted_device(&self, device_id: &str) -> bool {
        self.config
            .trusted_devices
            .iter()
            .any(|device| device == device_id)
    }
}

impl Default for ContextEvaluator {
    fn default() -> Self {
        Self::new(TrustConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    // Mid-January avoids DST transitions in every deployed timezone.
    fn at_local_hour(hour: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 1, 15, hour, 30, 0)
            .single()
            .expect("unambiguous local time")
            .with_timezone(&Utc)
    }

    fn request(ip: &str, device: &str, hour: u32) -> AccessRequest {
        let mut req = AccessRequest::new("alice", "s3:GetObject", "arn:aws:s3:::bucket", ip, device);
        req.request_time = at_local_hour(hour);
        req
    }

    #[test]
    fn trusted_context_is_allowed() {
        let verdict = ContextEvaluator::default().evaluate(&request(
            "192.168.1.12",
            "device-laptop-001",
            10,
        ));
        assert_eq!(verdict.decision, Decision::Allow);
        assert_eq!(verdict.reason, "context validated");
    }

    #[test]
    fn untrusted_network_denies_before_any_other_check() {
        // Off-network, off-hours, unknown device: the network reason wins.
        let verdict =
            ContextEvaluator::default().evaluate(&request("8.8.8.8", "unknown-device-999", 3));
        assert_eq!(verdict.decision, Decision::Deny);
        assert!(verdict.reason.starts_with("untrusted network source"));
    }

    #[test]
    fn off_hours_denies_before_device_check() {
        let verdict =
            ContextEvaluator::default().evaluate(&request("10.0.4.2", "unknown-device-999", 22));
        assert_eq!(verdict.decision, Decision::Deny);
        assert_eq!(verdict.reason, "outside business hours");
    }

    #[test]
    fn unknown_device_is_flagged_for_review() {
        let verdict =
            ContextEvaluator::default().evaluate(&request("10.0.4.2", "unknown-device-999", 10));
        assert_eq!(verdict.decision, Decision::Review);
        assert!(verdict.reason.starts_with("unrecognized device"));
    }

    #[test]
    fn business_hours_window_is_half_open() {
        let evaluator = ContextEvaluator::default();
        let at_start = evaluator.evaluate(&request("192.168.0.9", "device-laptop-001", 8));
        assert_eq!(at_start.decision, Decision::Allow);

        let at_end = evaluator.evaluate(&request("192.168.0.9", "device-laptop-001", 20));
        assert_eq!(at_end.decision, Decision::Deny);
        assert_eq!(at_end.reason, "outside business hours");
    }

    #[test]
    fn every_context_is_decided() {
        let evaluator = ContextEvaluator::default();
        for ip in ["192.168.1.1", "8.8.8.8"] {
            for device in ["device-admin-001", "stray-tablet"] {
                for hour in [0, 8, 12, 19, 20, 23] {
                    let verdict = evaluator.evaluate(&request(ip, device, hour));
                    assert!(matches!(
                        verdict.decision,
                        Decision::Allow | Decision::Review | Decision::Deny
                    ));
                    assert!(!verdict.reason.is_empty());
                }
            }
        }
    }
}
