//! Key purge selection
//!
//! Keys are ordered newest first by `validAfterTime`. The newest key is never
//! selected; every other key older than the threshold is. Keys whose creation
//! time is missing or unparseable are left alone.

use crate::provider::gcp::client::ServiceAccountKey;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Select the keys to delete
pub fn keys_to_purge<'a>(
    keys: &'a [ServiceAccountKey],
    now: DateTime<Utc>,
    threshold: Duration,
) -> Vec<&'a ServiceAccountKey> {
    let mut dated: Vec<(DateTime<Utc>, &ServiceAccountKey)> = keys
        .iter()
        .filter_map(|key| match parse_created_at(&key.valid_after_time) {
            Some(created_at) => Some((created_at, key)),
            None => {
                warn!(
                    "Key {} has unusable validAfterTime '{}', skipping",
                    key.name, key.valid_after_time
                );
                None
            }
        })
        .collect();

    dated.sort_by(|a, b| b.0.cmp(&a.0));

    dated
        .into_iter()
        .skip(1)
        .filter(|(created_at, _)| now - *created_at > threshold)
        .map(|(_, key)| key)
        .collect()
}

fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
