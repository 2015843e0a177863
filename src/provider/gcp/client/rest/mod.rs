//! GCP IAM REST Client
//!
//! Native REST implementation for the IAM API v1 and the Cloud Resource Manager
//! API v1. Uses reqwest for HTTP requests and the GKE metadata server for
//! OAuth2 access tokens.
//!
//! This implementation:
//! - Works directly with HTTP mock servers (endpoints are configurable)
//! - Uses reqwest with rustls (no OpenSSL dependencies)
//! - Caches the access token until shortly before it expires
//!
//! References:
//! - [IAM REST API v1](https://cloud.google.com/iam/docs/reference/rest)
//! - [Resource Manager REST API v1](https://cloud.google.com/resource-manager/reference/rest)

mod operations;
mod requests;
mod responses;

// Re-export types
pub use requests::*;
pub use responses::*;

use anyhow::{Context, Result};
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the metadata server says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// GCP IAM REST client
pub struct IamREST {
    http_client: Client,
    iam_base_url: String,
    resource_manager_base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for IamREST {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamREST")
            .field("iam_base_url", &self.iam_base_url)
            .field("resource_manager_base_url", &self.resource_manager_base_url)
            .finish_non_exhaustive()
    }
}

impl IamREST {
    /// Create a new GCP IAM REST client
    ///
    /// Authentication uses Workload Identity through the metadata server. The
    /// first token is fetched eagerly so a misconfigured pod fails at startup.
    ///
    /// # Errors
    /// Returns an error if client initialization or token retrieval fails
    #[allow(
        clippy::missing_errors_doc,
        reason = "Error documentation is provided in doc comments"
    )]
    pub async fn new(iam_endpoint: &str, resource_manager_endpoint: &str) -> Result<Self> {
        info!(
            "Initializing GCP IAM REST client (iam: {}, resource manager: {})",
            iam_endpoint, resource_manager_endpoint
        );

        // Create HTTP client with rustls (already configured in Cargo.toml)
        let http_client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        let client = Self {
            http_client,
            iam_base_url: iam_endpoint.trim_end_matches('/').to_string(),
            resource_manager_base_url: resource_manager_endpoint.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        };

        client.access_token().await?;
        Ok(client)
    }

    /// Current access token, refreshed from the metadata server when close to expiry
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
            debug!("Access token close to expiry, refreshing");
        }

        let token = self.fetch_access_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Get OAuth2 access token from the metadata server (Workload Identity)
    async fn fetch_access_token(&self) -> Result<CachedToken> {
        let response = self
            .http_client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context(
                "Metadata server not available. Ensure the pod runs in GKE with Workload Identity enabled",
            )?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Metadata server returned status {} while fetching access token: {}",
                status,
                error_text
            );
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response from metadata server")?;
        debug!(
            "Retrieved access token from metadata server, expires in {}s",
            token_response.expires_in
        );

        Ok(CachedToken {
            value: token_response.access_token,
            expires_at: Instant::now() + Duration::from_secs(token_response.expires_in),
        })
    }

    /// Build an authenticated IAM API request for a `v1/` relative path
    pub(crate) async fn iam_request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}/v1/{}", self.iam_base_url, path);
        self.make_request(method, &url, body).await
    }

    /// Build an authenticated Resource Manager API request for a `v1/` relative path
    pub(crate) async fn resource_manager_request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}/v1/{}", self.resource_manager_base_url, path);
        self.make_request(method, &url, body).await
    }

    /// Build HTTP request with authentication headers
    async fn make_request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::RequestBuilder> {
        let access_token = self.access_token().await?;

        let mut request = self
            .http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            request = request.json(&body);
        }

        Ok(request)
    }

    /// Handle GCP API error responses
    pub(crate) fn error_from_response(status: reqwest::StatusCode, error_text: &str) -> anyhow::Error {
        // Try to parse GCP error response
        if let Ok(error_response) = serde_json::from_str::<GcpErrorResponse>(error_text) {
            anyhow::anyhow!(
                "GCP API error: {} (code: {}, status: {})",
                error_response.error.message,
                error_response.error.code,
                error_response.error.status
            )
        } else {
            // Include status code in error message for easier matching in tests
            anyhow::anyhow!(
                "HTTP {} (status: {}): {}",
                status.as_u16(),
                status,
                error_text
            )
        }
    }
}
