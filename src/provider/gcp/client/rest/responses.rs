//! # Response Types
//!
//! IAM and Resource Manager REST API response structures.

use serde::Deserialize;

use crate::provider::gcp::client::{ServiceAccount, ServiceAccountKey};

/// Response of `GET /v1/projects/{project}/serviceAccounts`
///
/// API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/projects.serviceAccounts/list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListServiceAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<ServiceAccount>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Response of `GET /v1/{name}/keys`
///
/// API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/projects.serviceAccounts.keys/list
#[derive(Debug, Default, Deserialize)]
pub struct ListKeysResponse {
    #[serde(default)]
    pub keys: Vec<ServiceAccountKey>,
}

// ============================================================================
// Error Response Structures
// ============================================================================

/// GCP API error response wrapper
///
/// API Reference: https://cloud.google.com/apis/design/errors
#[derive(Debug, Deserialize)]
pub struct GcpErrorResponse {
    /// Error details
    pub error: GcpError,
}

/// Detailed error information from GCP API
#[derive(Debug, Deserialize)]
pub struct GcpError {
    /// HTTP status code (e.g., 404, 403, 500)
    pub code: u16,
    /// Human-readable error message
    pub message: String,
    /// Error status string (e.g., "NOT_FOUND", "PERMISSION_DENIED")
    #[serde(default)]
    pub status: String,
}

/// OAuth2 access token response from GCP metadata server
///
/// Endpoint: `http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token`
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}
