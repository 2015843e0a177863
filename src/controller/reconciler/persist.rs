//! # Persist
//!
//! Write the state annotation back and refresh the resource so the next
//! write in the same pass carries the latest resource version.

use super::types::{Pass, Reconciler, ReconcilerError};
use crate::constants::ANNOTATION_STATE;
use crate::controller::resource::ManagedResource;
use chrono::Utc;
use kube::ResourceExt;
use tracing::debug;

impl<K: ManagedResource> Reconciler<K> {
    /// Encode `pass.current` into the resource, update it and re-read it
    ///
    /// Other annotations and data already set on the in-memory resource are
    /// written along with the state.
    pub(super) async fn persist(&self, pass: &mut Pass<K>) -> Result<(), ReconcilerError> {
        let encoded = pass.current.encode()?;
        pass.resource
            .annotations_mut()
            .insert(ANNOTATION_STATE.to_string(), encoded);

        let updated = self
            .store
            .replace(&pass.resource)
            .await
            .map_err(ReconcilerError::Store)?;
        pass.resource = updated;

        let namespace = pass.namespace();
        let name = pass.resource.name_any();
        pass.resource = self
            .store
            .get(&namespace, &name)
            .await
            .map_err(ReconcilerError::Store)?;

        debug!("Persisted state for {} {}", K::KIND, pass.resource.identity());
        Ok(())
    }

    /// Stamp `lastAttempt` and persist it before any IAM call
    pub(super) async fn take_lease(&self, pass: &mut Pass<K>) -> Result<(), ReconcilerError> {
        pass.current.stamp_attempt(Utc::now());
        self.persist(pass).await
    }
}
