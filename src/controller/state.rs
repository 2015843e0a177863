//! # Persisted State
//!
//! The controller's only durable memory about a resource, stored as JSON in the
//! state annotation.
//!
//! Decoding never fails: a missing or unreadable annotation is the same as a
//! resource that was never reconciled. Timestamps are RFC3339 strings; an
//! empty or unparseable timestamp reads as the epoch.

use crate::constants::ANNOTATION_STATE;
use crate::provider::Permission;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Controller state persisted in the state annotation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    #[serde(with = "string_bool")]
    pub enabled: bool,
    #[serde(rename = "serviceAccountName")]
    pub name: String,
    pub filename: String,
    #[serde(with = "string_bool")]
    pub disable_key_rotation: bool,
    /// Canonical cloud name; empty until an account is known
    pub full_service_account_name: String,
    pub full_service_account_email: String,
    pub permissions: Vec<Permission>,
    pub last_renewed: String,
    /// Lease stamp
    pub last_attempt: String,
    #[serde(deserialize_with = "lenient_count::deserialize")]
    pub keys_purged: usize,
}

impl PersistedState {
    /// Decode the state annotation, falling back to the zero value
    pub fn decode(annotations: &BTreeMap<String, String>) -> Self {
        annotations
            .get(ANNOTATION_STATE)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Serialize to the annotation value
    ///
    /// # Errors
    /// Returns an error if serialization fails
    #[allow(
        clippy::missing_errors_doc,
        reason = "Error documentation is provided in doc comments"
    )]
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn has_account(&self) -> bool {
        !self.full_service_account_name.is_empty()
    }

    pub fn last_attempt_at(&self) -> DateTime<Utc> {
        parse_timestamp(&self.last_attempt)
    }

    pub fn last_renewed_at(&self) -> DateTime<Utc> {
        parse_timestamp(&self.last_renewed)
    }

    /// Take the lease at `now`
    pub fn stamp_attempt(&mut self, now: DateTime<Utc>) {
        self.last_attempt = format_timestamp(now);
    }

    pub fn mark_renewed(&mut self, now: DateTime<Utc>) {
        self.last_renewed = format_timestamp(now);
    }
}

/// Parse an RFC3339 timestamp, reading anything unusable as the epoch
pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Booleans stored as `"true"`/`"false"`, read from either strings or JSON booleans
mod string_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => value,
            Raw::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        })
    }
}

/// Counters read from numbers or numeric strings; anything else is zero
mod lenient_count {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Count(usize),
        Text(String),
        Other(serde_json::Value),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Count(value) => value,
            Raw::Text(text) => text.trim().parse().unwrap_or_default(),
            Raw::Other(_) => 0,
        })
    }
}
