//! GCP IAM Client
//!
//! Raw access to the IAM and Cloud Resource Manager APIs, one method per REST
//! call. Ownership checks, naming and purge policy live one level up in
//! [`IamService`](super::IamService); this layer just moves JSON.
//!
//! - **REST Client**: Native REST implementation using reqwest

pub mod common;
pub mod rest;

pub use rest::IamREST;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Service account resource
///
/// API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/projects.serviceAccounts#ServiceAccount
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    /// `projects/{project}/serviceAccounts/{email}`
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Numeric id assigned by IAM, serialized as a string
    #[serde(default)]
    pub unique_id: String,
    #[serde(default)]
    pub display_name: String,
}

/// Service account key resource
///
/// API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/projects.serviceAccounts.keys#ServiceAccountKey
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountKey {
    /// `projects/{project}/serviceAccounts/{email}/keys/{key}`
    pub name: String,
    /// Only present in the response to a create call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_data: Option<String>,
    /// RFC3339 creation time of the key
    #[serde(default)]
    pub valid_after_time: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("name", &self.name)
            .field("valid_after_time", &self.valid_after_time)
            .finish_non_exhaustive()
    }
}

/// Project IAM policy
///
/// API Reference: https://cloud.google.com/resource-manager/reference/rest/Shared.Types/Policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// One method per IAM / Resource Manager REST call
#[async_trait]
pub trait ServiceAccountApi: Send + Sync {
    /// `projects.serviceAccounts.get`; `None` when the account does not exist
    async fn get_account(&self, project_id: &str, email: &str) -> Result<Option<ServiceAccount>>;

    /// `projects.serviceAccounts.create`
    async fn create_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> Result<ServiceAccount>;

    /// `projects.serviceAccounts.list`, all pages
    async fn list_accounts(&self, project_id: &str) -> Result<Vec<ServiceAccount>>;

    /// `projects.serviceAccounts.delete`; `false` when the account was already gone
    async fn delete_account(&self, name: &str) -> Result<bool>;

    /// `projects.serviceAccounts.keys.create`
    async fn create_key(&self, name: &str) -> Result<ServiceAccountKey>;

    /// `projects.serviceAccounts.keys.list`, user managed keys only
    async fn list_keys(&self, name: &str) -> Result<Vec<ServiceAccountKey>>;

    /// `projects.serviceAccounts.keys.delete`; `false` when the key was already gone
    async fn delete_key(&self, key_name: &str) -> Result<bool>;

    /// `projects.getIamPolicy`
    async fn get_iam_policy(&self, project_id: &str) -> Result<Policy>;
}
