//! # Provider Modules
//!
//! Cloud identity providers backing the reconciler.
//!
//! The reconciler only talks to the [`IamBackend`] trait; `gcp` provides the
//! Google Cloud IAM implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gcp;

/// A role binding requested for a service account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub project: String,
    pub role: String,
}

/// A cloud service account known to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    /// Canonical resource name (`projects/{p}/serviceAccounts/{email}`)
    pub name: String,
    pub email: String,
}

/// Freshly created key material
#[derive(Clone)]
pub struct KeyMaterial {
    /// Canonical key name
    pub name: String,
    /// Base64 encoded private key file
    pub private_key_data: String,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// IAM backend errors
///
/// Policy violations and not-found are kept distinct from transient failures so
/// the caller can log an actionable message instead of retrying blindly.
#[derive(Debug, Error)]
pub enum IamError {
    #[error("invalid service account name: {0}")]
    Validation(String),

    #[error("refusing to touch service account {name}: {reason}")]
    PolicyViolation { name: String, reason: String },

    #[error("service account not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl IamError {
    pub fn policy_violation(name: &str, reason: impl Into<String>) -> Self {
        IamError::PolicyViolation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Operations the reconciler needs from a cloud identity provider
#[async_trait]
pub trait IamBackend: Send + Sync {
    /// Create a new account for `logical_name`
    async fn create_account(&self, logical_name: &str) -> Result<AccountRef, IamError>;

    /// Find a pre-provisioned account by its display name
    ///
    /// When several accounts match, the one with the largest unique id wins.
    async fn find_account_by_logical_name(&self, logical_name: &str)
        -> Result<AccountRef, IamError>;

    /// Create a new key for an owned account
    async fn create_key(&self, canonical_name: &str) -> Result<KeyMaterial, IamError>;

    /// Delete all but the newest key older than `threshold`, returning the number deleted
    async fn purge_keys(
        &self,
        canonical_name: &str,
        threshold: chrono::Duration,
    ) -> Result<usize, IamError>;

    /// Delete an owned account, returning whether anything was deleted
    async fn delete_account(&self, canonical_name: &str) -> Result<bool, IamError>;

    /// Bring the account's project role bindings in line with `permissions`
    async fn set_permissions(
        &self,
        canonical_name: &str,
        permissions: &[Permission],
    ) -> Result<(), IamError>;
}
