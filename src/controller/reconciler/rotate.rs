//! # Rotate Keys
//!
//! Create a fresh key once the rotation interval has passed and write the
//! decoded key file into the secret.

use super::lease::{lease_free, rotation_disabled, rotation_due};
use super::types::{ActionStatus, Pass, Reconciler, ReconcilerError};
use crate::controller::resource::ManagedResource;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use tracing::{error, info};

impl<K: ManagedResource> Reconciler<K> {
    pub(super) fn key_rotation_disabled(&self, pass: &Pass<K>) -> bool {
        rotation_disabled(
            pass.resource.has_key_file(&pass.desired.filename),
            self.config.allow_disable_key_rotation_override,
            pass.desired.disable_key_rotation,
        )
    }

    pub(super) async fn rotate_keys(&self, pass: &mut Pass<K>) -> ActionStatus {
        let now = Utc::now();
        if !K::CARRIES_KEYS
            || !pass.desired.is_active()
            || !(pass.new_account || lease_free(&pass.current, now))
            || !pass.current.has_account()
            || self.key_rotation_disabled(pass)
            || !rotation_due(&pass.current, now, self.config.key_rotation_interval())
        {
            return ActionStatus::Skipped;
        }

        match self.try_rotate_keys(pass).await {
            Ok(()) => {
                info!(
                    "{} {}: key file {} has been renewed",
                    K::KIND,
                    pass.resource.identity(),
                    pass.desired.filename
                );
                ActionStatus::Succeeded
            }
            Err(e) => {
                error!(
                    "{} {}: failed to rotate key: {}",
                    K::KIND,
                    pass.resource.identity(),
                    e
                );
                ActionStatus::Failed
            }
        }
    }

    async fn try_rotate_keys(&self, pass: &mut Pass<K>) -> Result<(), ReconcilerError> {
        if !pass.new_account {
            self.take_lease(pass).await?;
        }

        let key = self
            .iam
            .create_key(&pass.current.full_service_account_name)
            .await?;
        let key_file = general_purpose::STANDARD.decode(key.private_key_data.as_bytes())?;

        if !pass.resource.store_key_file(&pass.desired.filename, key_file) {
            return Err(ReconcilerError::Unsupported {
                kind: K::KIND,
                what: "key files",
            });
        }

        pass.current.mark_renewed(Utc::now());
        pass.current.filename = pass.desired.filename.clone();
        pass.current.disable_key_rotation = pass.desired.disable_key_rotation;

        self.persist(pass).await
    }
}
