//! # Guards
//!
//! Time based guards evaluated at the start of each sub-action. All take `now`
//! explicitly.

use crate::constants::{LEASE_DURATION_MINUTES, PURGE_MIN_HOURS_SINCE_RENEWAL};
use crate::controller::state::PersistedState;
use chrono::{DateTime, Duration, Utc};

/// The lease is free once `lastAttempt` is more than 15 minutes old
pub fn lease_free(current: &PersistedState, now: DateTime<Utc>) -> bool {
    now - current.last_attempt_at() > Duration::minutes(LEASE_DURATION_MINUTES)
}

pub fn rotation_due(current: &PersistedState, now: DateTime<Utc>, interval: Duration) -> bool {
    now - current.last_renewed_at() > interval
}

/// Purge waits until a renewal has happened and is at least two hours old
pub fn purge_due(current: &PersistedState, now: DateTime<Utc>) -> bool {
    !current.last_renewed.is_empty()
        && now - current.last_renewed_at() > Duration::hours(PURGE_MIN_HOURS_SINCE_RENEWAL)
}

/// Rotation opt-out only applies to resources that already hold a key
pub fn rotation_disabled(has_key_file: bool, override_allowed: bool, requested: bool) -> bool {
    has_key_file && override_allowed && requested
}
