//! # Desired State
//!
//! The user's intent, read fresh from a resource's annotations on every pass.
//! Extraction is total: a missing or malformed annotation yields that field's
//! default instead of an error.

use crate::constants::{
    ANNOTATION_DISABLE_KEY_ROTATION, ANNOTATION_ENABLED, ANNOTATION_FILENAME, ANNOTATION_NAME,
    ANNOTATION_PERMISSIONS, DEFAULT_KEY_FILENAME,
};
use crate::provider::Permission;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub enabled: bool,
    /// Logical account name; empty disables provisioning
    pub name: String,
    pub filename: String,
    pub disable_key_rotation: bool,
    pub permissions: Vec<Permission>,
}

impl Default for DesiredState {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::new(),
            filename: DEFAULT_KEY_FILENAME.to_string(),
            disable_key_rotation: false,
            permissions: Vec::new(),
        }
    }
}

impl DesiredState {
    /// Read the desired state from annotations
    pub fn extract(annotations: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();

        let filename = annotations
            .get(ANNOTATION_FILENAME)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map_or(defaults.filename, str::to_string);

        Self {
            enabled: parse_bool(annotations, ANNOTATION_ENABLED),
            name: annotations
                .get(ANNOTATION_NAME)
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            filename,
            disable_key_rotation: parse_bool(annotations, ANNOTATION_DISABLE_KEY_ROTATION),
            permissions: parse_permissions(annotations),
        }
    }

    /// Provisioning requested with a usable name
    pub fn is_active(&self) -> bool {
        self.enabled && !self.name.is_empty()
    }
}

/// Order-insensitive comparison of permission lists, duplicates ignored
pub fn same_permissions(a: &[Permission], b: &[Permission]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

fn parse_bool(annotations: &BTreeMap<String, String>, key: &str) -> bool {
    match annotations.get(key).map(|v| v.trim().parse::<bool>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            debug!("Ignoring malformed boolean in annotation {}", key);
            false
        }
        None => false,
    }
}

fn parse_permissions(annotations: &BTreeMap<String, String>) -> Vec<Permission> {
    let Some(raw) = annotations.get(ANNOTATION_PERMISSIONS) else {
        return Vec::new();
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        debug!("Ignoring malformed permissions annotation: {}", e);
        Vec::new()
    })
}
