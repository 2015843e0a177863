//! # Managed Resources
//!
//! Capabilities the reconciler needs from a Kubernetes kind. `Secret` carries
//! key files in its data map; `ServiceAccount` carries the Workload Identity
//! annotation instead.

use crate::constants::ANNOTATION_WORKLOAD_IDENTITY;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::{ByteString, NamespaceResourceScope};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A Kubernetes kind the reconciler can drive
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind label for logs and metrics
    const KIND: &'static str;

    /// Whether keys are rotated into this kind
    const CARRIES_KEYS: bool;

    /// Whether a key file is present under `filename`
    fn has_key_file(&self, _filename: &str) -> bool {
        false
    }

    /// Store key file contents under `filename`, returning `false` if the kind cannot hold it
    fn store_key_file(&mut self, _filename: &str, _contents: Vec<u8>) -> bool {
        false
    }

    /// Point the resource at `email` for Workload Identity, returning `true` if anything changed
    fn bind_workload_identity(&mut self, _email: &str) -> bool {
        false
    }

    /// `namespace/name` for log lines
    fn identity(&self) -> String {
        format!(
            "{}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }
}

impl ManagedResource for Secret {
    const KIND: &'static str = "Secret";
    const CARRIES_KEYS: bool = true;

    fn has_key_file(&self, filename: &str) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| data.contains_key(filename))
    }

    fn store_key_file(&mut self, filename: &str, contents: Vec<u8>) -> bool {
        self.data
            .get_or_insert_with(Default::default)
            .insert(filename.to_string(), ByteString(contents));
        true
    }
}

impl ManagedResource for ServiceAccount {
    const KIND: &'static str = "ServiceAccount";
    const CARRIES_KEYS: bool = false;

    fn bind_workload_identity(&mut self, email: &str) -> bool {
        if email.is_empty() {
            return false;
        }
        let annotations = self.annotations_mut();
        if annotations.get(ANNOTATION_WORKLOAD_IDENTITY).map(String::as_str) == Some(email) {
            return false;
        }
        annotations.insert(ANNOTATION_WORKLOAD_IDENTITY.to_string(), email.to_string());
        true
    }
}
