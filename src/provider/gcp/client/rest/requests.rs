//! # Request Types
//!
//! IAM and Resource Manager REST API request structures.
//!
//! These structs match the JSON payloads of the IAM API v1 as documented at:
//! https://cloud.google.com/iam/docs/reference/rest

use serde::Serialize;

/// Request body for creating a new service account
///
/// Used in `POST /v1/projects/{project}/serviceAccounts`.
///
/// API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/projects.serviceAccounts/create
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceAccountRequest {
    /// Account id, 6-30 characters, becomes the email local part
    pub account_id: String,
    pub service_account: ServiceAccountSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSpec {
    pub display_name: String,
}

impl CreateServiceAccountRequest {
    pub fn new(account_id: &str, display_name: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            service_account: ServiceAccountSpec {
                display_name: display_name.to_string(),
            },
        }
    }
}

/// Request body for creating a key
///
/// Used in `POST /v1/{name}/keys`. Both fields are left at the API defaults
/// (`TYPE_GOOGLE_CREDENTIALS_FILE`, `KEY_ALG_RSA_2048`).
///
/// API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/projects.serviceAccounts.keys/create
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {}

/// Request body for reading a project policy
///
/// Used in `POST /v1/projects/{project}:getIamPolicy`.
#[derive(Debug, Default, Serialize)]
pub struct GetIamPolicyRequest {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_service_account_request_shape() {
        let request = CreateServiceAccountRequest::new("dev-api-abcd", "my-project/api");
        let json = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(json["accountId"], "dev-api-abcd");
        assert_eq!(json["serviceAccount"]["displayName"], "my-project/api");
    }
}
