//! # Delete
//!
//! Deletion path for resources removed from the cluster. The state comes from
//! the last known annotations; there is nothing left to hold a lease.

use super::types::{ActionStatus, Initiator, Reconciler};
use crate::controller::resource::ManagedResource;
use crate::controller::state::PersistedState;
use crate::observability::metrics;
use kube::ResourceExt;
use tracing::{error, info, Instrument};

impl<K: ManagedResource> Reconciler<K> {
    /// Delete the cloud account recorded on a deleted resource
    pub async fn delete(&self, resource: &K, initiator: Initiator) -> ActionStatus {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        let span = tracing::info_span!(
            "controller.delete",
            resource.kind = K::KIND,
            resource.namespace = namespace.as_str(),
            resource.name = name.as_str(),
            initiator = initiator.as_str()
        );

        async {
            let current = PersistedState::decode(resource.annotations());
            let status = if current.has_account() {
                info!(
                    "{} {}: deleting service account {} because the resource has been deleted",
                    K::KIND,
                    resource.identity(),
                    current.full_service_account_name
                );
                match self
                    .iam
                    .delete_account(&current.full_service_account_name)
                    .await
                {
                    Ok(true) => ActionStatus::Succeeded,
                    Ok(false) => ActionStatus::Skipped,
                    Err(e) => {
                        error!(
                            "{} {}: failed to delete service account {}: {}",
                            K::KIND,
                            resource.identity(),
                            current.full_service_account_name,
                            e
                        );
                        ActionStatus::Failed
                    }
                }
            } else {
                ActionStatus::Skipped
            };

            metrics::record_action(
                "delete",
                &namespace,
                status.as_str(),
                initiator.as_str(),
                self.config.mode.as_str(),
                K::KIND,
            );
            status
        }
        .instrument(span)
        .await
    }
}
