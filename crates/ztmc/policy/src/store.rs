//! Versioned action-policy store with parse-then-swap reload.

use crate::PolicyError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use ztmc_types::{Decision, PolicyDecision};

/// Match conditions of a single policy. Only action matching is supported.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolicyConditions {
    /// Action patterns: exact (case-insensitive), `*`, or a `prefix*`
    /// wildcard such as `s3:*`.
    #[serde(default)]
    pub action: Vec<String>,
}

/// A single action-based policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Policy {
    pub conditions: PolicyConditions,
    pub decision: Decision,
    pub description: String,
}

impl Policy {
    fn matches(&self, action: &str) -> bool {
        self.conditions.action.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }
            if let Some(prefix) = pattern.strip_suffix('*') {
                return action.len() >= prefix.len()
                    && action[..prefix.len()].eq_ignore_ascii_case(prefix);
            }
            pattern.eq_ignore_ascii_case(action)
        })
    }
}

/// An ordered policy set plus the fallthrough decision.
///
/// Read-only during evaluation; reload replaces the whole set at once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicySet {
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(rename = "default_action", default = "PolicySet::default_decision")]
    pub default_decision: Decision,
}

impl PolicySet {
    fn default_decision() -> Decision {
        Decision::Deny
    }

    /// First-match-wins lookup over the ordered policy sequence.
    pub fn evaluate(&self, action: &str) -> PolicyDecision {
        for policy in &self.policies {
            if policy.matches(action) {
                return PolicyDecision {
                    decision: policy.decision,
                    reason: policy.description.clone(),
                };
            }
        }
        PolicyDecision {
            decision: self.default_decision,
            reason: "no matching policy (default)".to_string(),
        }
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            policies: Vec::new(),
            default_decision: Decision::Deny,
        }
    }
}

/// Holds the live [`PolicySet`] and swaps it atomically on reload.
///
/// Concurrent readers always observe a fully parsed set: [`PolicyStore::snapshot`]
/// hands out the current `Arc`, and reload replaces the pointer only after a
/// successful parse. A failed reload keeps the last-known-good set.
pub struct PolicyStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<PolicySet>>,
}

impl PolicyStore {
    /// Load the policy document at `path`. Fatal on error: the pipeline must
    /// not serve requests without a policy.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref().to_path_buf();
        let set = Self::parse_file(&path)?;
        info!(path = %path.display(), policies = set.policies.len(), "policy set loaded");
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(set)),
        })
    }

    /// Wrap an in-memory policy set (tests, embedded configuration).
    pub fn from_set(set: PolicySet) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// The current set. Cheap; evaluation holds this snapshot for its whole
    /// duration so a mid-request reload cannot tear a decision.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        Arc::clone(&self.current.read())
    }

    /// Source document path, if this store was loaded from a file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-parse the source document and swap it in.
    ///
    /// On failure the previous set stays live and the error is surfaced to
    /// the caller as well as the log.
    pub fn reload(&self) -> Result<usize, PolicyError> {
        let path = self.path.as_ref().ok_or(PolicyError::NoSource)?;
        match Self::parse_file(path) {
            Ok(set) => {
                let count = set.policies.len();
                *self.current.write() = Arc::new(set);
                info!(path = %path.display(), policies = count, "policy set reloaded");
                Ok(count)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "policy reload failed, keeping last-known-good set");
                Err(err)
            }
        }
    }

    fn parse_file(path: &Path) -> Result<PolicySet, PolicyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| PolicyError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
