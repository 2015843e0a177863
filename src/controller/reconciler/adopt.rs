//! # Adopt or Create
//!
//! First sub-action: obtain a cloud account for a resource that has none yet.
//! In adopt mode the account is looked up by display name, otherwise it is
//! created.

use super::lease::lease_free;
use super::types::{ActionStatus, Pass, Reconciler, ReconcilerError};
use crate::config::Mode;
use crate::controller::resource::ManagedResource;
use crate::provider::{AccountRef, IamError};
use chrono::Utc;
use tracing::{debug, error, info, warn};

impl<K: ManagedResource> Reconciler<K> {
    pub(super) async fn adopt_or_create(&self, pass: &mut Pass<K>) -> ActionStatus {
        if !pass.desired.is_active()
            || pass.current.has_account()
            || !lease_free(&pass.current, Utc::now())
        {
            return ActionStatus::Skipped;
        }

        match self.try_adopt_or_create(pass).await {
            Ok(()) => ActionStatus::Succeeded,
            Err(ReconcilerError::Iam(IamError::NotFound(message))) => {
                warn!(
                    "{} {}: no service account to adopt ({}); pre-provision the account first",
                    K::KIND,
                    pass.resource.identity(),
                    message
                );
                ActionStatus::Failed
            }
            Err(e) => {
                error!(
                    "{} {}: failed to obtain service account {}: {}",
                    K::KIND,
                    pass.resource.identity(),
                    pass.desired.name,
                    e
                );
                ActionStatus::Failed
            }
        }
    }

    async fn try_adopt_or_create(&self, pass: &mut Pass<K>) -> Result<(), ReconcilerError> {
        self.take_lease(pass).await?;

        let account: AccountRef = match self.config.mode {
            Mode::Adopt => {
                debug!(
                    "{} {}: looking up service account {}",
                    K::KIND,
                    pass.resource.identity(),
                    pass.desired.name
                );
                self.iam
                    .find_account_by_logical_name(&pass.desired.name)
                    .await?
            }
            Mode::Create | Mode::CreateAndSetPermissions => {
                info!(
                    "{} {}: creating service account {}",
                    K::KIND,
                    pass.resource.identity(),
                    pass.desired.name
                );
                self.iam.create_account(&pass.desired.name).await?
            }
        };

        pass.current.enabled = true;
        pass.current.name = pass.desired.name.clone();
        pass.current.full_service_account_name = account.name;
        pass.current.full_service_account_email = account.email;
        pass.resource
            .bind_workload_identity(&pass.current.full_service_account_email);

        self.persist(pass).await?;
        pass.new_account = true;

        info!(
            "{} {}: using service account {}",
            K::KIND,
            pass.resource.identity(),
            pass.current.full_service_account_name
        );
        Ok(())
    }

    /// Keep the Workload Identity annotation pointed at the recorded account
    ///
    /// Runs without an IAM call, so it is not lease-gated.
    pub(super) async fn bind_identity(&self, pass: &mut Pass<K>) {
        if !pass.desired.is_active() || !pass.current.has_account() {
            return;
        }
        let email = pass.current.full_service_account_email.clone();
        if !pass.resource.bind_workload_identity(&email) {
            return;
        }

        match self.persist(pass).await {
            Ok(()) => info!(
                "{} {}: bound Workload Identity to {}",
                K::KIND,
                pass.resource.identity(),
                email
            ),
            Err(e) => warn!(
                "{} {}: failed to bind Workload Identity: {}",
                K::KIND,
                pass.resource.identity(),
                e
            ),
        }
    }
}
