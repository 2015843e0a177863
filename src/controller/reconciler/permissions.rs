//! # Set Permissions
//!
//! Only active in `create-and-set-permissions` mode. Failures are warnings and
//! the sub-action never stamps the lease itself.

use super::lease::lease_free;
use super::types::{ActionStatus, Pass, Reconciler, ReconcilerError};
use crate::controller::desired::same_permissions;
use crate::controller::resource::ManagedResource;
use chrono::Utc;
use tracing::{info, warn};

impl<K: ManagedResource> Reconciler<K> {
    pub(super) async fn set_permissions(&self, pass: &mut Pass<K>) -> ActionStatus {
        if !self.config.mode.manages_permissions()
            || !pass.desired.is_active()
            || !(pass.new_account || lease_free(&pass.current, Utc::now()))
            || !pass.current.has_account()
            || same_permissions(&pass.desired.permissions, &pass.current.permissions)
        {
            return ActionStatus::Skipped;
        }

        match self.try_set_permissions(pass).await {
            Ok(()) => {
                info!(
                    "{} {}: permissions set for {}",
                    K::KIND,
                    pass.resource.identity(),
                    pass.current.full_service_account_name
                );
                ActionStatus::Succeeded
            }
            Err(e) => {
                warn!(
                    "{} {}: failed to set permissions: {}",
                    K::KIND,
                    pass.resource.identity(),
                    e
                );
                ActionStatus::Failed
            }
        }
    }

    async fn try_set_permissions(&self, pass: &mut Pass<K>) -> Result<(), ReconcilerError> {
        self.iam
            .set_permissions(
                &pass.current.full_service_account_name,
                &pass.desired.permissions,
            )
            .await?;

        pass.current.permissions = pass.desired.permissions.clone();
        self.persist(pass).await
    }
}
