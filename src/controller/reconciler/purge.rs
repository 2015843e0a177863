//! # Purge Keys
//!
//! Delete old keys once a renewal has settled. Depends only on `lastRenewed`,
//! not on whether rotation ran in this pass.

use super::lease::{lease_free, purge_due};
use super::types::{ActionStatus, Pass, Reconciler, ReconcilerError};
use crate::controller::resource::ManagedResource;
use crate::observability::metrics;
use chrono::Utc;
use tracing::{error, info};

impl<K: ManagedResource> Reconciler<K> {
    pub(super) async fn purge_keys(&self, pass: &mut Pass<K>) -> ActionStatus {
        let now = Utc::now();
        if !K::CARRIES_KEYS
            || !pass.desired.is_active()
            || !lease_free(&pass.current, now)
            || !pass.current.enabled
            || !purge_due(&pass.current, now)
            || !pass.current.has_account()
            || self.key_rotation_disabled(pass)
        {
            return ActionStatus::Skipped;
        }

        match self.try_purge_keys(pass).await {
            Ok(deleted) => {
                info!(
                    "{} {}: purged {} keys of {}",
                    K::KIND,
                    pass.resource.identity(),
                    deleted,
                    pass.current.full_service_account_name
                );
                ActionStatus::Succeeded
            }
            Err(e) => {
                error!(
                    "{} {}: failed to purge keys: {}",
                    K::KIND,
                    pass.resource.identity(),
                    e
                );
                ActionStatus::Failed
            }
        }
    }

    async fn try_purge_keys(&self, pass: &mut Pass<K>) -> Result<usize, ReconcilerError> {
        self.take_lease(pass).await?;

        let deleted = self
            .iam
            .purge_keys(
                &pass.current.full_service_account_name,
                self.config.purge_threshold(),
            )
            .await?;
        metrics::increment_keys_purged(deleted);

        pass.current.keys_purged = deleted;
        self.persist(pass).await?;
        Ok(deleted)
    }
}
