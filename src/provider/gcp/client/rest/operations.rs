//! # IAM Operations
//!
//! Implementation of [`ServiceAccountApi`] for the IAM REST API.
//!
//! Every call gets its own `gcp.iam.*` span and records duration and outcome
//! through [`OperationTracker`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, field, info, info_span, Instrument};

use super::requests::{CreateKeyRequest, CreateServiceAccountRequest, GetIamPolicyRequest};
use super::responses::{ListKeysResponse, ListServiceAccountsResponse};
use crate::provider::gcp::client::common::{format_account_path, OperationTracker};
use crate::provider::gcp::client::rest::IamREST;
use crate::provider::gcp::client::{Policy, ServiceAccount, ServiceAccountApi, ServiceAccountKey};

const LIST_PAGE_SIZE: &str = "100";

/// Query parameters for one page of a list call
fn page_query(page_token: Option<&str>) -> Vec<(&'static str, &str)> {
    let mut query = vec![("pageSize", LIST_PAGE_SIZE)];
    if let Some(token) = page_token {
        query.push(("pageToken", token));
    }
    query
}

/// Decode a successful JSON body or turn the response into a descriptive error
async fn read_json<T: DeserializeOwned>(
    tracker: &OperationTracker,
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracker.record_error(&error_text);
        return Err(IamREST::error_from_response(status, &error_text).context(format!("Failed to {what}")));
    }

    match response.json::<T>().await {
        Ok(value) => {
            tracker.record_success();
            Ok(value)
        }
        Err(e) => {
            tracker.record_error(&e.to_string());
            Err(e).context(format!("Failed to parse response to {what}"))
        }
    }
}

/// Treat 404 as "already absent" for delete calls
async fn read_deleted(tracker: &OperationTracker, response: reqwest::Response, what: &str) -> Result<bool> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        tracker.record_success();
        return Ok(false);
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracker.record_error(&error_text);
        return Err(IamREST::error_from_response(status, &error_text).context(format!("Failed to {what}")));
    }
    tracker.record_success();
    Ok(true)
}

#[async_trait]
impl ServiceAccountApi for IamREST {
    async fn get_account(&self, project_id: &str, email: &str) -> Result<Option<ServiceAccount>> {
        let span = tracing::debug_span!(
            "gcp.iam.get_account",
            account.email = email,
            project.id = project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let tracker = OperationTracker::new(tracing::Span::current(), "get_account");
            let response = self
                .iam_request(Method::GET, &format_account_path(project_id, email), None)
                .await?
                .send()
                .await
                .context("Failed to get service account")?;

            if response.status() == StatusCode::NOT_FOUND {
                tracker.record_success();
                return Ok(None);
            }

            read_json(&tracker, response, &format!("get service account {email}"))
                .await
                .map(Some)
        }
        .instrument(span)
        .await
    }

    async fn create_account(
        &self,
        project_id: &str,
        account_id: &str,
        display_name: &str,
    ) -> Result<ServiceAccount> {
        let span = info_span!(
            "gcp.iam.create_account",
            account.id = account_id,
            project.id = project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let tracker = OperationTracker::new(tracing::Span::current(), "create_account");
            info!("Creating GCP service account: {}", account_id);

            let request = CreateServiceAccountRequest::new(account_id, display_name);
            let response = self
                .iam_request(
                    Method::POST,
                    &format!("projects/{project_id}/serviceAccounts"),
                    Some(serde_json::to_value(&request)?),
                )
                .await?
                .send()
                .await
                .context("Failed to create service account")?;

            read_json(&tracker, response, &format!("create service account {account_id}")).await
        }
        .instrument(span)
        .await
    }

    async fn list_accounts(&self, project_id: &str) -> Result<Vec<ServiceAccount>> {
        let span = tracing::debug_span!(
            "gcp.iam.list_accounts",
            project.id = project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let mut accounts = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let tracker = OperationTracker::new(tracing::Span::current(), "list_accounts");
                let path = format!("projects/{project_id}/serviceAccounts");

                let response = self
                    .iam_request(Method::GET, &path, None)
                    .await?
                    .query(&page_query(page_token.as_deref()))
                    .send()
                    .await
                    .context("Failed to list service accounts")?;

                let page: ListServiceAccountsResponse =
                    read_json(&tracker, response, "list service accounts").await?;
                accounts.extend(page.accounts);

                match page.next_page_token.filter(|t| !t.is_empty()) {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }

            debug!("Listed {} service accounts in {}", accounts.len(), project_id);
            Ok(accounts)
        }
        .instrument(span)
        .await
    }

    async fn delete_account(&self, name: &str) -> Result<bool> {
        let span = info_span!(
            "gcp.iam.delete_account",
            account.name = name,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let tracker = OperationTracker::new(tracing::Span::current(), "delete_account");
            info!("Deleting GCP service account: {}", name);

            let response = self
                .iam_request(Method::DELETE, name, None)
                .await?
                .send()
                .await
                .context("Failed to delete service account")?;

            read_deleted(&tracker, response, &format!("delete service account {name}")).await
        }
        .instrument(span)
        .await
    }

    async fn create_key(&self, name: &str) -> Result<ServiceAccountKey> {
        let span = info_span!(
            "gcp.iam.create_key",
            account.name = name,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let tracker = OperationTracker::new(tracing::Span::current(), "create_key");
            let response = self
                .iam_request(
                    Method::POST,
                    &format!("{name}/keys"),
                    Some(serde_json::to_value(CreateKeyRequest::default())?),
                )
                .await?
                .send()
                .await
                .context("Failed to create service account key")?;

            read_json(&tracker, response, &format!("create key for {name}")).await
        }
        .instrument(span)
        .await
    }

    async fn list_keys(&self, name: &str) -> Result<Vec<ServiceAccountKey>> {
        let span = tracing::debug_span!(
            "gcp.iam.list_keys",
            account.name = name,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let tracker = OperationTracker::new(tracing::Span::current(), "list_keys");
            let response = self
                .iam_request(Method::GET, &format!("{name}/keys?keyTypes=USER_MANAGED"), None)
                .await?
                .send()
                .await
                .context("Failed to list service account keys")?;

            let keys: ListKeysResponse =
                read_json(&tracker, response, &format!("list keys for {name}")).await?;
            Ok(keys.keys)
        }
        .instrument(span)
        .await
    }

    async fn delete_key(&self, key_name: &str) -> Result<bool> {
        let span = info_span!(
            "gcp.iam.delete_key",
            key.name = key_name,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let tracker = OperationTracker::new(tracing::Span::current(), "delete_key");
            let response = self
                .iam_request(Method::DELETE, key_name, None)
                .await?
                .send()
                .await
                .context("Failed to delete service account key")?;

            read_deleted(&tracker, response, &format!("delete key {key_name}")).await
        }
        .instrument(span)
        .await
    }

    async fn get_iam_policy(&self, project_id: &str) -> Result<Policy> {
        let span = tracing::debug_span!(
            "gcp.crm.get_iam_policy",
            project.id = project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty
        );

        async {
            let tracker = OperationTracker::new(tracing::Span::current(), "get_iam_policy");
            let response = self
                .resource_manager_request(
                    Method::POST,
                    &format!("projects/{project_id}:getIamPolicy"),
                    Some(serde_json::to_value(GetIamPolicyRequest::default())?),
                )
                .await?
                .send()
                .await
                .context("Failed to get project IAM policy")?;

            read_json(&tracker, response, &format!("get IAM policy of {project_id}")).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_has_no_token() {
        assert_eq!(page_query(None), vec![("pageSize", "100")]);
    }

    #[test]
    fn test_page_token_is_url_encoded() {
        let request = reqwest::Client::new()
            .get("https://iam.googleapis.com/v1/projects/p/serviceAccounts")
            .query(&page_query(Some("a+b/c&d=e")))
            .build()
            .expect("request should build");

        assert_eq!(
            request.url().query(),
            Some("pageSize=100&pageToken=a%2Bb%2Fc%26d%3De")
        );
        let token = request
            .url()
            .query_pairs()
            .find(|(key, _)| key == "pageToken")
            .map(|(_, value)| value.into_owned());
        assert_eq!(token.as_deref(), Some("a+b/c&d=e"));
    }
}
