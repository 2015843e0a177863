//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Annotation enabling service account provisioning for a resource (`"true"` to enable)
pub const ANNOTATION_ENABLED: &str = "octopilot.io/gcp-service-account";

/// Annotation carrying the logical service account name
pub const ANNOTATION_NAME: &str = "octopilot.io/gcp-service-account-name";

/// Annotation overriding the key file name inside the secret data
pub const ANNOTATION_FILENAME: &str = "octopilot.io/gcp-service-account-filename";

/// Annotation opting a resource out of key rotation
pub const ANNOTATION_DISABLE_KEY_ROTATION: &str =
    "octopilot.io/gcp-service-account-disable-key-rotation";

/// Annotation carrying a JSON list of `{"project": .., "role": ..}` permissions
pub const ANNOTATION_PERMISSIONS: &str = "octopilot.io/gcp-service-account-permissions";

/// Annotation holding the controller's persisted state as JSON
pub const ANNOTATION_STATE: &str = "octopilot.io/gcp-service-account-state";

/// Workload Identity annotation set on Kubernetes ServiceAccounts
pub const ANNOTATION_WORKLOAD_IDENTITY: &str = "iam.gke.io/gcp-service-account";

/// Default key file name inside the secret data
pub const DEFAULT_KEY_FILENAME: &str = "service-account-key.json";

/// How long a stamped `lastAttempt` holds the lease (minutes)
pub const LEASE_DURATION_MINUTES: i64 = 15;

/// Minimum age of the last renewal before stale keys are purged (hours)
pub const PURGE_MIN_HOURS_SINCE_RENEWAL: i64 = 2;

/// Default key rotation interval (hours)
pub const DEFAULT_KEY_ROTATION_AFTER_HOURS: i64 = 168;

/// Default age after which non-newest keys are purged (hours)
pub const DEFAULT_PURGE_KEYS_AFTER_HOURS: i64 = 336;

/// Length of the random suffix appended to account ids
pub const ACCOUNT_ID_SUFFIX_LENGTH: usize = 4;

/// Maximum length of a GCP service account id
pub const MAX_ACCOUNT_ID_LENGTH: usize = 30;

/// Maximum length of a GCP service account display name
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;

/// Shortest accepted logical service account name
pub const MIN_LOGICAL_NAME_LENGTH: usize = 3;

/// Longest accepted logical service account name
pub const MAX_LOGICAL_NAME_LENGTH: usize = 69;

/// Attempts at finding a free account id before giving up
pub const MAX_ACCOUNT_ID_ATTEMPTS: usize = 10;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 9101;

/// Default watch connection timeout (seconds)
pub const DEFAULT_WATCH_TIMEOUT_SECS: u32 = 300;

/// Default delay before restarting the watch stream (seconds, jittered)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 30;

/// Default period between full-list polls (seconds, jittered)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 900;

/// Fraction of a base delay used as jitter deviation in each direction
pub const JITTER_FRACTION: f64 = 0.25;

/// Default GCP IAM REST endpoint
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.googleapis.com";

/// Default GCP Cloud Resource Manager REST endpoint
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";

/// Email domain suffix of GCP service accounts
pub const SERVICE_ACCOUNT_EMAIL_DOMAIN: &str = "iam.gserviceaccount.com";
