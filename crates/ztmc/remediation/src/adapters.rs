//! Cloud adapter capability set.
//!
//! One operation per cloud: revoke a user's risky access. These are
//! capability stubs behind the trait, not SDK bindings; a production
//! adapter must make `revoke_access` idempotent because the dispatcher may
//! retry it.

use async_trait::async_trait;
use thiserror::Error;
use ztmc_types::CloudProvider;

/// Errors surfaced by a cloud adapter call.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("cloud control plane rejected the call: {0}")]
    Rejected(String),

    #[error("cloud control plane unreachable: {0}")]
    Unreachable(String),
}

/// Corrective capability implemented per cloud.
#[async_trait]
pub trait CloudAdapter: Send + Sync {
    /// The control plane this adapter speaks to.
    fn provider(&self) -> CloudProvider;

    /// Revoke the user's risky access and describe what was done.
    async fn revoke_access(&self, user: &str) -> Result<String, AdapterError>;
}

/// AWS stub: stands in for an IAM group-membership revocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct AwsAdapter;

#[async_trait]
impl CloudAdapter for AwsAdapter {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Aws
    }

    async fn revoke_access(&self, user: &str) -> Result<String, AdapterError> {
        Ok(format!(
            "removed {user} from SensitiveAccess group in AWS (stub)"
        ))
    }
}

/// Azure stub: stands in for a role-assignment removal.
#[derive(Clone, Copy, Debug, Default)]
pub struct AzureAdapter;

#[async_trait]
impl CloudAdapter for AzureAdapter {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Azure
    }

    async fn revoke_access(&self, user: &str) -> Result<String, AdapterError> {
        Ok(format!("Azure remediation triggered for {user} (stub)"))
    }
}

/// GCP stub: stands in for an IAM role revocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct GcpAdapter;

#[async_trait]
impl CloudAdapter for GcpAdapter {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Gcp
    }

    async fn revoke_access(&self, user: &str) -> Result<String, AdapterError> {
        Ok(format!("GCP remediation triggered for {user} (stub)"))
    }
}
