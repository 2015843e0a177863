//! # Reconciler
//!
//! Core reconciliation logic for annotated `Secret` and `ServiceAccount`
//! resources.
//!
//! Every pass recomputes the desired state from annotations and the current
//! state from the state annotation, then runs four sub-actions in a fixed
//! order. Each is gated independently and persists its own result, so a
//! failure in one never prevents the next from being attempted.
//!
//! ## Reconciliation Flow
//!
//! 1. **Adopt or create**: obtain a cloud account when none is recorded
//! 2. **Set permissions**: `create-and-set-permissions` mode only
//! 3. **Rotate keys**: write a fresh key file once the rotation interval passed
//! 4. **Purge keys**: delete old keys two hours after a renewal
//!
//! ## Lease
//!
//! `lastAttempt` in the persisted state works as an optimistic lock between the
//! watch loop and the poll loop. It is stamped and persisted before any
//! mutating IAM call and holds for 15 minutes. A pass that just obtained an
//! account may proceed to rotation without waiting for its own lease.

mod adopt;
mod delete;
pub mod lease;
mod permissions;
mod persist;
mod purge;
mod rotate;
mod types;

pub use types::{ActionStatus, Initiator, PassReport, Reconciler, ReconcilerError};

use crate::config::Mode;
use crate::controller::resource::ManagedResource;
use crate::observability::metrics;
use kube::ResourceExt;
use std::time::Instant;
use tracing::{debug, Instrument};
use types::Pass;

impl<K: ManagedResource> Reconciler<K> {
    /// Run one reconciliation pass for `resource`
    ///
    /// Never fails: sub-action errors are logged and reported as `Failed`.
    pub async fn reconcile(&self, resource: K, initiator: Initiator) -> PassReport {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        let span = tracing::info_span!(
            "controller.reconcile",
            resource.kind = K::KIND,
            resource.namespace = namespace.as_str(),
            resource.name = name.as_str(),
            initiator = initiator.as_str()
        );

        async move {
            let start = Instant::now();
            metrics::increment_reconciliations(initiator.as_str(), K::KIND);

            let mut pass = Pass::new(resource, initiator);

            let account = self.adopt_or_create(&mut pass).await;
            self.record(self.account_action(), &pass, account);

            self.bind_identity(&mut pass).await;

            let permissions = self.set_permissions(&mut pass).await;
            self.record("set_permissions", &pass, permissions);

            let rotate = self.rotate_keys(&mut pass).await;
            let purge = self.purge_keys(&mut pass).await;
            if K::CARRIES_KEYS {
                self.record("rotate", &pass, rotate);
                self.record("purge", &pass, purge);
            }

            let report = PassReport {
                account,
                permissions,
                rotate,
                purge,
            };
            debug!("Reconciliation pass finished: {:?}", report);
            metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
            report
        }
        .instrument(span)
        .await
    }

    fn account_action(&self) -> &'static str {
        match self.config.mode {
            Mode::Adopt => "retrieve",
            Mode::Create | Mode::CreateAndSetPermissions => "create",
        }
    }

    fn record(&self, action: &str, pass: &Pass<K>, status: ActionStatus) {
        metrics::record_action(
            action,
            &pass.namespace(),
            status.as_str(),
            pass.initiator.as_str(),
            self.config.mode.as_str(),
            K::KIND,
        );
    }
}
