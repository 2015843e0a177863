//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `gcp_service_account_actions_total` - Reconciliation sub-action outcomes by action, namespace, status, initiator, mode and kind
//! - `gcp_service_account_keys_purged_total` - Total number of service account keys purged
//! - `gcp_service_account_reconciliations_total` - Total number of reconciliation passes
//! - `gcp_service_account_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `gcp_service_account_iam_operations_total` - Total number of IAM API operations by operation
//! - `gcp_service_account_iam_operation_errors_total` - Total number of failed IAM API operations by operation
//! - `gcp_service_account_iam_operation_duration_seconds` - Duration of IAM API operations
//! - `gcp_service_account_watch_restarts_total` - Total number of watch stream restarts
//! - `gcp_service_account_poll_cycles_total` - Total number of completed poll cycles

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static ACTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcp_service_account_actions_total",
            "Total number of reconciliation sub-actions by outcome",
        ),
        &["action", "namespace", "status", "initiator", "mode", "kind"],
    )
    .expect("Failed to create ACTIONS_TOTAL metric - this should never happen")
});

static KEYS_PURGED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gcp_service_account_keys_purged_total",
        "Total number of service account keys purged",
    )
    .expect("Failed to create KEYS_PURGED_TOTAL metric - this should never happen")
});

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcp_service_account_reconciliations_total",
            "Total number of reconciliation passes",
        ),
        &["initiator", "kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "gcp_service_account_reconciliation_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static IAM_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcp_service_account_iam_operations_total",
            "Total number of IAM API operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create IAM_OPERATIONS_TOTAL metric - this should never happen")
});

static IAM_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcp_service_account_iam_operation_errors_total",
            "Total number of failed IAM API operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create IAM_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static IAM_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "gcp_service_account_iam_operation_duration_seconds",
            "Duration of IAM API operations in seconds by operation",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create IAM_OPERATION_DURATION metric - this should never happen")
});

static WATCH_RESTARTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcp_service_account_watch_restarts_total",
            "Total number of watch stream restarts",
        ),
        &["kind"],
    )
    .expect("Failed to create WATCH_RESTARTS_TOTAL metric - this should never happen")
});

static POLL_CYCLES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "gcp_service_account_poll_cycles_total",
            "Total number of completed poll cycles",
        ),
        &["kind"],
    )
    .expect("Failed to create POLL_CYCLES_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry
///
/// # Errors
/// Returns an error if a metric is registered twice
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(ACTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEYS_PURGED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(IAM_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(IAM_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(IAM_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(WATCH_RESTARTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(POLL_CYCLES_TOTAL.clone()))?;

    Ok(())
}

/// Record the outcome of one reconciliation sub-action
pub fn record_action(
    action: &str,
    namespace: &str,
    status: &str,
    initiator: &str,
    mode: &str,
    kind: &str,
) {
    ACTIONS_TOTAL
        .with_label_values(&[action, namespace, status, initiator, mode, kind])
        .inc();
}

pub fn increment_keys_purged(count: usize) {
    KEYS_PURGED_TOTAL.inc_by(count as u64);
}

pub fn increment_reconciliations(initiator: &str, kind: &str) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[initiator, kind])
        .inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Record a successful IAM API operation
pub fn record_iam_operation(operation: &str, duration: f64) {
    IAM_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    IAM_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

/// Increment IAM operation errors counter
pub fn increment_iam_operation_errors(operation: &str) {
    IAM_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_watch_restarts(kind: &str) {
    WATCH_RESTARTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_poll_cycles(kind: &str) {
    POLL_CYCLES_TOTAL.with_label_values(&[kind]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // This should not panic - metrics should register successfully
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_record_action() {
        let labels = ["rotate", "metrics-test", "succeeded", "poller", "create", "Secret"];
        let before = ACTIONS_TOTAL.with_label_values(&labels).get();
        record_action("rotate", "metrics-test", "succeeded", "poller", "create", "Secret");
        let after = ACTIONS_TOTAL.with_label_values(&labels).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_keys_purged() {
        let before = KEYS_PURGED_TOTAL.get();
        increment_keys_purged(3);
        let after = KEYS_PURGED_TOTAL.get();
        assert_eq!(after, before + 3u64);
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL
            .with_label_values(&["watcher", "Secret"])
            .get();
        increment_reconciliations("watcher", "Secret");
        let after = RECONCILIATIONS_TOTAL
            .with_label_values(&["watcher", "Secret"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        observe_reconciliation_duration(1.5);
        // Just verify it doesn't panic - histogram observation doesn't return a value
    }

    #[test]
    fn test_record_iam_operation() {
        let before = IAM_OPERATIONS_TOTAL.with_label_values(&["create_key"]).get();
        record_iam_operation("create_key", 0.3);
        let after = IAM_OPERATIONS_TOTAL.with_label_values(&["create_key"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_iam_operation_errors() {
        let before = IAM_OPERATION_ERRORS_TOTAL
            .with_label_values(&["delete_key"])
            .get();
        increment_iam_operation_errors("delete_key");
        let after = IAM_OPERATION_ERRORS_TOTAL
            .with_label_values(&["delete_key"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_loop_counters() {
        let restarts = WATCH_RESTARTS_TOTAL.with_label_values(&["Secret"]).get();
        let polls = POLL_CYCLES_TOTAL.with_label_values(&["Secret"]).get();
        increment_watch_restarts("Secret");
        increment_poll_cycles("Secret");
        assert_eq!(
            WATCH_RESTARTS_TOTAL.with_label_values(&["Secret"]).get(),
            restarts + 1u64
        );
        assert_eq!(
            POLL_CYCLES_TOTAL.with_label_values(&["Secret"]).get(),
            polls + 1u64
        );
    }
}
