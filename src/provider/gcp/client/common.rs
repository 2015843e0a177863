//! Common utilities and helpers for the GCP IAM client
//!
//! Span and metric bookkeeping shared by every REST operation.

use crate::observability::metrics;
use std::time::{Duration, Instant};
use tracing::Span;

/// Records operation metrics and span attributes for a successful operation
pub fn record_success_metrics(span: &Span, operation: &str, duration: Duration) {
    span.record("operation.duration_ms", duration.as_millis() as u64);
    span.record("operation.success", true);
    metrics::record_iam_operation(operation, duration.as_secs_f64());
}

/// Records operation metrics and span attributes for a failed operation
pub fn record_error_metrics(span: &Span, operation: &str, error_message: &str, duration: Duration) {
    span.record("operation.success", false);
    span.record("error.message", error_message);
    span.record("operation.duration_ms", duration.as_millis() as u64);
    metrics::increment_iam_operation_errors(operation);
}

/// Formats a canonical service account name
pub fn format_account_path(project_id: &str, email: &str) -> String {
    format!("projects/{}/serviceAccounts/{}", project_id, email)
}

/// Helper struct for tracking operation state
#[derive(Debug)]
pub struct OperationTracker {
    start: Instant,
    span: Span,
    operation: &'static str,
}

impl OperationTracker {
    /// Create a new operation tracker
    pub fn new(span: Span, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            span,
            operation,
        }
    }

    /// Record success metrics
    pub fn record_success(&self) {
        record_success_metrics(&self.span, self.operation, self.start.elapsed());
    }

    /// Record error metrics
    pub fn record_error(&self, error_message: &str) {
        record_error_metrics(
            &self.span,
            self.operation,
            error_message,
            self.start.elapsed(),
        );
    }
}
