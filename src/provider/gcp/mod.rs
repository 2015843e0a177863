//! # GCP IAM Service
//!
//! [`IamBackend`] implementation on top of the raw IAM client.
//!
//! This module provides functionality to:
//! - Create service accounts with collision-checked ids
//! - Find pre-provisioned accounts by display name
//! - Create and purge keys
//! - Delete accounts
//! - Inspect project role bindings
//!
//! Every mutating call on an existing account goes through the ownership
//! validator first.

pub mod client;
pub mod naming;
pub mod ownership;
pub mod purge;

use crate::config::{ControllerConfig, OwnershipPolicy};
use crate::constants::MAX_ACCOUNT_ID_ATTEMPTS;
use crate::provider::{AccountRef, IamBackend, IamError, KeyMaterial, Permission};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use client::ServiceAccountApi;
use ownership::OwnershipValidator;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub use client::IamREST;

/// GCP IAM service bound to one governed project
pub struct IamService<A> {
    api: A,
    project_id: String,
    ownership: OwnershipPolicy,
    validator: OwnershipValidator,
}

impl<A> std::fmt::Debug for IamService<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamService")
            .field("project_id", &self.project_id)
            .field("ownership", &self.ownership)
            .finish_non_exhaustive()
    }
}

impl<A: ServiceAccountApi> IamService<A> {
    /// # Errors
    /// Returns an error if the ownership validator cannot be built
    #[allow(
        clippy::missing_errors_doc,
        reason = "Error documentation is provided in doc comments"
    )]
    pub fn new(api: A, config: &ControllerConfig) -> anyhow::Result<Self> {
        let validator = OwnershipValidator::new(&config.project_id, config.ownership.clone())?;
        Ok(Self {
            api,
            project_id: config.project_id.clone(),
            ownership: config.ownership.clone(),
            validator,
        })
    }

    /// Run every ownership check for `canonical_name`
    async fn ensure_owned(&self, canonical_name: &str) -> Result<(), IamError> {
        let local_part = self.validator.validate_name(canonical_name)?;

        if self.validator.requires_display_name() {
            let email = naming::account_email(&self.project_id, local_part);
            let account = self
                .api
                .get_account(&self.project_id, &email)
                .await?
                .ok_or_else(|| IamError::NotFound(canonical_name.to_string()))?;
            self.validator
                .validate_display_name(canonical_name, &account.display_name)?;
        }

        Ok(())
    }

    fn account_prefix(&self) -> Option<&str> {
        match &self.ownership {
            OwnershipPolicy::Prefix(prefix) => Some(prefix.as_str()),
            OwnershipPolicy::DisplayName(_) => None,
        }
    }
}

/// Email part of `projects/{p}/serviceAccounts/{email}`
fn email_of(canonical_name: &str) -> &str {
    canonical_name
        .rsplit_once("/serviceAccounts/")
        .map_or(canonical_name, |(_, email)| email)
}

#[async_trait]
impl<A: ServiceAccountApi> IamBackend for IamService<A> {
    async fn create_account(&self, logical_name: &str) -> Result<AccountRef, IamError> {
        naming::validate_logical_name(logical_name)?;
        let logical_name = logical_name.trim();
        let display_name = naming::display_name(self.ownership.display_token(), logical_name);

        for attempt in 1..=MAX_ACCOUNT_ID_ATTEMPTS {
            let account_id =
                naming::account_id(self.account_prefix(), logical_name, &naming::random_suffix());
            let email = naming::account_email(&self.project_id, &account_id);

            if self.api.get_account(&self.project_id, &email).await?.is_some() {
                debug!(
                    "Account id {} already taken (attempt {}), regenerating suffix",
                    account_id, attempt
                );
                continue;
            }

            let account = self
                .api
                .create_account(&self.project_id, &account_id, &display_name)
                .await?;
            info!(
                "Created service account {} for logical name {}",
                account.name, logical_name
            );

            let email = if account.email.is_empty() {
                email
            } else {
                account.email
            };
            return Ok(AccountRef {
                name: account.name,
                email,
            });
        }

        Err(IamError::Backend(anyhow!(
            "no free account id for '{logical_name}' after {MAX_ACCOUNT_ID_ATTEMPTS} attempts"
        )))
    }

    async fn find_account_by_logical_name(
        &self,
        logical_name: &str,
    ) -> Result<AccountRef, IamError> {
        let display_name = naming::display_name(self.ownership.display_token(), logical_name.trim());
        let accounts = self.api.list_accounts(&self.project_id).await?;

        let newest = accounts
            .into_iter()
            .filter(|account| account.display_name == display_name)
            .max_by_key(|account| account.unique_id.parse::<u128>().unwrap_or_default());

        match newest {
            Some(account) => {
                debug!(
                    "Found service account {} for display name {}",
                    account.name, display_name
                );
                Ok(AccountRef {
                    name: account.name,
                    email: account.email,
                })
            }
            None => Err(IamError::NotFound(format!(
                "no service account with display name '{display_name}' in project {}; pre-provision the account first",
                self.project_id
            ))),
        }
    }

    async fn create_key(&self, canonical_name: &str) -> Result<KeyMaterial, IamError> {
        self.ensure_owned(canonical_name).await?;

        let key = self.api.create_key(canonical_name).await?;
        let private_key_data = key.private_key_data.filter(|d| !d.is_empty()).ok_or_else(|| {
            IamError::Backend(anyhow!("key {} was created without private key data", key.name))
        })?;

        Ok(KeyMaterial {
            name: key.name,
            private_key_data,
        })
    }

    async fn purge_keys(
        &self,
        canonical_name: &str,
        threshold: chrono::Duration,
    ) -> Result<usize, IamError> {
        self.ensure_owned(canonical_name).await?;

        let keys = self.api.list_keys(canonical_name).await?;
        let selected = purge::keys_to_purge(&keys, Utc::now(), threshold);

        let mut deleted = 0;
        for key in selected {
            info!(
                "Deleting key {} created at {} because it is more than {} hours old",
                key.name,
                key.valid_after_time,
                threshold.num_hours()
            );
            if self.api.delete_key(&key.name).await? {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn delete_account(&self, canonical_name: &str) -> Result<bool, IamError> {
        match self.ensure_owned(canonical_name).await {
            Ok(()) => {}
            Err(IamError::NotFound(_)) => {
                info!("Service account {} is already gone", canonical_name);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        Ok(self.api.delete_account(canonical_name).await?)
    }

    async fn set_permissions(
        &self,
        canonical_name: &str,
        permissions: &[Permission],
    ) -> Result<(), IamError> {
        self.ensure_owned(canonical_name).await?;
        let member = format!("serviceAccount:{}", email_of(canonical_name));

        let mut by_project: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for permission in permissions {
            by_project
                .entry(permission.project.as_str())
                .or_default()
                .push(permission.role.as_str());
        }

        for (project, roles) in by_project {
            let policy = self.api.get_iam_policy(project).await?;
            for role in roles {
                let bound = policy
                    .bindings
                    .iter()
                    .any(|b| b.role == role && b.members.iter().any(|m| m == &member));
                if bound {
                    debug!("{} already has {} on {}", member, role, project);
                } else {
                    // TODO: apply missing bindings with setIamPolicy and an etag check
                    warn!(
                        "{} is missing role {} on project {}; bindings are not applied automatically",
                        member, role, project
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_of_canonical_name() {
        assert_eq!(
            email_of("projects/p/serviceAccounts/api-abcd@p.iam.gserviceaccount.com"),
            "api-abcd@p.iam.gserviceaccount.com"
        );
        assert_eq!(email_of("not-canonical"), "not-canonical");
    }
}
