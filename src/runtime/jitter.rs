//! # Jitter
//!
//! Randomized sleep durations so that replicas and restarts do not line up.

use crate::constants::JITTER_FRACTION;
use rand::Rng;
use std::time::Duration;

/// `base` shifted uniformly within ±25%
pub fn apply_jitter(base: Duration) -> Duration {
    let deviation = base.mul_f64(JITTER_FRACTION);
    if deviation.is_zero() {
        return base;
    }
    let offset = rand::thread_rng().gen_range(Duration::ZERO..deviation * 2);
    base - deviation + offset
}
