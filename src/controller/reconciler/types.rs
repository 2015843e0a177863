//! # Types
//!
//! Core types for the reconciler.

use crate::config::SharedControllerConfig;
use crate::controller::desired::DesiredState;
use crate::controller::resource::ManagedResource;
use crate::controller::state::PersistedState;
use crate::controller::store::ResourceStore;
use crate::provider::{IamBackend, IamError};
use kube::ResourceExt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Iam(#[from] IamError),

    #[error("resource store error: {0:#}")]
    Store(anyhow::Error),

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("key material is not valid base64: {0}")]
    KeyMaterial(#[from] base64::DecodeError),

    #[error("{kind} cannot carry {what}")]
    Unsupported {
        kind: &'static str,
        what: &'static str,
    },
}

/// What started a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    /// Watch stream event
    Watcher,
    /// Periodic full listing
    Poller,
}

impl Initiator {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Initiator::Watcher => "watcher",
            Initiator::Poller => "poller",
        }
    }
}

/// Outcome of one sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Succeeded,
    Failed,
    /// Guard not met, nothing was attempted
    Skipped,
}

impl ActionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Succeeded => "succeeded",
            ActionStatus::Failed => "failed",
            ActionStatus::Skipped => "skipped",
        }
    }
}

/// Sub-action outcomes of one pass, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub account: ActionStatus,
    pub permissions: ActionStatus,
    pub rotate: ActionStatus,
    pub purge: ActionStatus,
}

/// Working state of one reconciliation pass
///
/// `resource` is refreshed after every persist; `current` accumulates the
/// mutations of earlier sub-actions.
#[derive(Debug)]
pub(crate) struct Pass<K> {
    pub resource: K,
    pub desired: DesiredState,
    pub current: PersistedState,
    pub initiator: Initiator,
    /// An account was created or adopted earlier in this pass
    pub new_account: bool,
}

impl<K: ManagedResource> Pass<K> {
    pub fn new(resource: K, initiator: Initiator) -> Self {
        let desired = DesiredState::extract(resource.annotations());
        let current = PersistedState::decode(resource.annotations());
        Self {
            resource,
            desired,
            current,
            initiator,
            new_account: false,
        }
    }

    pub fn namespace(&self) -> String {
        self.resource.namespace().unwrap_or_default()
    }
}

/// Reconciliation engine for one resource kind
pub struct Reconciler<K: ManagedResource> {
    pub(crate) store: Arc<dyn ResourceStore<K>>,
    pub(crate) iam: Arc<dyn IamBackend>,
    pub(crate) config: SharedControllerConfig,
}

impl<K: ManagedResource> std::fmt::Debug for Reconciler<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &K::KIND)
            .field("mode", &self.config.mode)
            .finish_non_exhaustive()
    }
}

impl<K: ManagedResource> Reconciler<K> {
    pub fn new(
        store: Arc<dyn ResourceStore<K>>,
        iam: Arc<dyn IamBackend>,
        config: SharedControllerConfig,
    ) -> Self {
        Self { store, iam, config }
    }
}
