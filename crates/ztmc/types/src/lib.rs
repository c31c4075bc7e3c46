//! ZTMC Types - Shared data model for the zero-trust access pipeline
//!
//! Every component (decision point, enforcement point, remediation,
//! monitoring) speaks these types. Nothing in here performs I/O.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One inbound access request: who, what action, on which resource, from
/// where. Immutable once constructed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessRequest {
    pub user: String,
    pub action: String,
    /// URI-like resource identifier (e.g. `arn:aws:s3:::secure-bucket`).
    pub resource: String,
    pub source_ip: String,
    pub device_id: String,
    pub request_time: DateTime<Utc>,
}

impl AccessRequest {
    /// Build a request stamped with the current time.
    pub fn new(
        user: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        source_ip: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            action: action.into(),
            resource: resource.into(),
            source_ip: source_ip.into(),
            device_id: device_id.into(),
            request_time: Utc::now(),
        }
    }

    /// Names of required fields that are empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.user.trim().is_empty() {
            missing.push("user");
        }
        if self.action.trim().is_empty() {
            missing.push("action");
        }
        if self.resource.trim().is_empty() {
            missing.push("resource");
        }
        if self.source_ip.trim().is_empty() {
            missing.push("source_ip");
        }
        if self.device_id.trim().is_empty() {
            missing.push("device_id");
        }
        missing
    }
}

/// The tri-state access decision.
///
/// Ordered by strictness: `Deny > Review > Allow`. Deny-overrides
/// combination relies on this ordering.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Review,
    Deny,
}

impl Decision {
    /// Upper-case wire form used in logs and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Review => "REVIEW",
            Decision::Deny => "DENY",
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the contextual (network / time / device) checks for one
/// request. Ephemeral, produced and consumed within a single evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextVerdict {
    pub decision: Decision,
    pub reason: String,
}

/// Outcome of the action-policy lookup for one request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub reason: String,
}

/// Cloud control plane a resource belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudProvider {
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "Azure")]
    Azure,
    #[serde(rename = "GCP")]
    Gcp,
}

impl CloudProvider {
    /// Best-effort classification of a resource identifier.
    ///
    /// Precedence is fixed: AWS markers first, then Azure markers, then the
    /// GCP fallthrough. Classification happens exactly once per request, at
    /// the enforcement point; everything downstream matches on the enum.
    pub fn classify(resource: &str) -> Self {
        let lower = resource.to_ascii_lowercase();
        if lower.starts_with("arn:aws:") || lower.contains("aws") {
            CloudProvider::Aws
        } else if lower.contains("azure") || lower.contains("/subscriptions/") {
            CloudProvider::Azure
        } else {
            CloudProvider::Gcp
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Azure => "Azure",
            CloudProvider::Gcp => "GCP",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Final result of running one request through the full pipeline.
///
/// Forwarded to monitoring and returned to the caller; not retained.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnforcementOutcome {
    pub request: AccessRequest,
    pub decision: Decision,
    pub reason: String,
    pub cloud: CloudProvider,
    pub remediation_actions: Vec<String>,
}

/// Kind of an audit event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AccessRequest,
    Remediation,
    PolicyReload,
    Alarm,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AccessRequest => "ACCESS_REQUEST",
            EventKind::Remediation => "REMEDIATION",
            EventKind::PolicyReload => "POLICY_RELOAD",
            EventKind::Alarm => "ALARM",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record. Once written, never mutated or deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Source module name (`pep`, `arm`, `policy`, `monitor`).
    pub module: String,
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    pub user: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub actions_taken: Vec<String>,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl EventRecord {
    fn base(module: &str, kind: EventKind, user: String, resource: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            module: module.to_string(),
            kind,
            user,
            resource,
            cloud: None,
            decision: None,
            reason: None,
            actions_taken: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    /// The one record every enforcement produces.
    pub fn access_request(
        request: &AccessRequest,
        cloud: CloudProvider,
        decision: Decision,
        reason: impl Into<String>,
    ) -> Self {
        let mut record = Self::base(
            "pep",
            EventKind::AccessRequest,
            request.user.clone(),
            request.resource.clone(),
        );
        record.cloud = Some(cloud);
        record.decision = Some(decision);
        record.reason = Some(reason.into());
        record
            .details
            .insert("action".to_string(), request.action.clone().into());
        record
            .details
            .insert("source_ip".to_string(), request.source_ip.clone().into());
        record
            .details
            .insert("device_id".to_string(), request.device_id.clone().into());
        record
    }

    /// One record per remediation call, carrying every action attempted.
    pub fn remediation(
        user: impl Into<String>,
        resource: impl Into<String>,
        cloud: CloudProvider,
        decision: Decision,
        reason: impl Into<String>,
        actions: Vec<String>,
    ) -> Self {
        let mut record = Self::base("arm", EventKind::Remediation, user.into(), resource.into());
        record.cloud = Some(cloud);
        record.decision = Some(decision);
        record.reason = Some(reason.into());
        record.actions_taken = actions;
        record
    }

    /// Policy set swapped in (or a reload attempt rejected).
    pub fn policy_reload(source: impl Into<String>, detail: impl Into<String>) -> Self {
        let mut record = Self::base("policy", EventKind::PolicyReload, "system".into(), source.into());
        record.reason = Some(detail.into());
        record
    }

    /// Operational escalation, e.g. the audit log became unwritable.
    pub fn alarm(resource: impl Into<String>, message: impl Into<String>) -> Self {
        let mut record = Self::base("monitor", EventKind::Alarm, "system".into(), resource.into());
        record.reason = Some(message.into());
        record
    }
}

/// Aggregate counters over the audit trail.
///
/// A cache, not the source of truth: every counter is exactly derivable by
/// replaying the event log from an empty state through [`MetricsSnapshot::apply`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_access_requests: u64,
    pub total_remediations: u64,
    pub allow_count: u64,
    pub review_count: u64,
    pub deny_count: u64,
    #[serde(default)]
    pub per_cloud: BTreeMap<String, u64>,
    #[serde(default)]
    pub events_by_type: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Fold one audit record into the counters.
    ///
    /// Decision counters move only for ACCESS_REQUEST records, so that the
    /// sum of decision counts always equals the number of access events in
    /// the log. Cloud and kind counters move for every record.
    pub fn apply(&mut self, record: &EventRecord) {
        match record.kind {
            EventKind::AccessRequest => {
                self.total_access_requests += 1;
                match record.decision {
                    Some(Decision::Allow) => self.allow_count += 1,
                    Some(Decision::Review) => self.review_count += 1,
                    Some(Decision::Deny) => self.deny_count += 1,
                    None => {}
                }
            }
            EventKind::Remediation => self.total_remediations += 1,
            EventKind::PolicyReload | EventKind::Alarm => {}
        }

        if let Some(cloud) = record.cloud {
            *self.per_cloud.entry(cloud.name().to_string()).or_insert(0) += 1;
        }
        *self
            .events_by_type
            .entry(record.kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Sum of the per-decision counters.
    pub fn decision_total(&self) -> u64 {
        self.allow_count + self.review_count + self.deny_count
    }
}
