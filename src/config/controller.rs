//! # Controller Configuration
//!
//! Controller-level settings loaded from command line flags or environment variables.
//!
//! Every flag can also be provided through its environment variable so the
//! deployment can populate them from a ConfigMap using `envFrom`.

use crate::constants::{
    ACCOUNT_ID_SUFFIX_LENGTH, DEFAULT_IAM_ENDPOINT, DEFAULT_KEY_ROTATION_AFTER_HOURS, DEFAULT_METRICS_PORT,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PURGE_KEYS_AFTER_HOURS, DEFAULT_RESOURCE_MANAGER_ENDPOINT,
    DEFAULT_WATCH_RESTART_DELAY_SECS, DEFAULT_WATCH_TIMEOUT_SECS, MAX_ACCOUNT_ID_LENGTH,
};
use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;

/// Shared, immutable controller configuration
pub type SharedControllerConfig = Arc<ControllerConfig>;

/// How the controller obtains cloud service accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Only look up accounts provisioned out-of-band, never create them
    Adopt,
    /// Create accounts on demand
    Create,
    /// Create accounts on demand and manage their project role bindings
    CreateAndSetPermissions,
}

impl Mode {
    /// Label value used in metrics and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Adopt => "adopt",
            Mode::Create => "create",
            Mode::CreateAndSetPermissions => "create-and-set-permissions",
        }
    }

    /// Whether the set-permissions sub-action is active
    pub fn manages_permissions(self) -> bool {
        matches!(self, Mode::CreateAndSetPermissions)
    }
}

/// How the controller recognises accounts it owns
///
/// Both policies additionally require the canonical name to live in the
/// governed project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipPolicy {
    /// Account ids are prefixed with `{prefix}-`
    Prefix(String),
    /// Display names are `{local_project_id}/{logical name}`
    DisplayName(String),
}

impl OwnershipPolicy {
    /// Token embedded in display names created by this controller
    pub fn display_token(&self) -> &str {
        match self {
            OwnershipPolicy::Prefix(token) | OwnershipPolicy::DisplayName(token) => token,
        }
    }
}

/// Command line / environment arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gcp-service-account-controller",
    about = "Provisions GCP service accounts for annotated Kubernetes resources and rotates their keys"
)]
pub struct ControllerArgs {
    /// Operating mode
    #[arg(long, env = "MODE", value_enum, default_value_t = Mode::Create)]
    pub mode: Mode,

    /// The Google Cloud project id in which service accounts live
    #[arg(long, env = "SERVICE_ACCOUNT_PROJECT_ID")]
    pub service_account_project_id: String,

    /// Prefix for service account ids created by this controller
    #[arg(long, env = "SERVICE_ACCOUNT_PREFIX")]
    pub service_account_prefix: Option<String>,

    /// Identity of this controller instance, embedded in display names
    #[arg(long, env = "LOCAL_PROJECT_ID")]
    pub local_project_id: Option<String>,

    /// Hours before a key is rotated
    #[arg(long, env = "KEY_ROTATION_AFTER_HOURS", default_value_t = DEFAULT_KEY_ROTATION_AFTER_HOURS)]
    pub key_rotation_after_hours: i64,

    /// Hours before a non-newest key is purged
    #[arg(long, env = "PURGE_KEYS_AFTER_HOURS", default_value_t = DEFAULT_PURGE_KEYS_AFTER_HOURS)]
    pub purge_keys_after_hours: i64,

    /// Allow resources to opt out of key rotation via annotation
    #[arg(long, env = "ALLOW_DISABLE_KEY_ROTATION_OVERRIDE", default_value_t = false)]
    pub allow_disable_key_rotation_override: bool,

    /// Reconcile Secrets
    #[arg(long, env = "WATCH_SECRETS", default_value_t = true, action = clap::ArgAction::Set)]
    pub watch_secrets: bool,

    /// Reconcile ServiceAccounts
    #[arg(long, env = "WATCH_SERVICE_ACCOUNTS", default_value_t = false, action = clap::ArgAction::Set)]
    pub watch_service_accounts: bool,

    /// Watch connection timeout in seconds
    #[arg(long, env = "WATCH_TIMEOUT_SECS", default_value_t = DEFAULT_WATCH_TIMEOUT_SECS)]
    pub watch_timeout_secs: u32,

    /// Base delay before restarting the watch, jittered by 25%
    #[arg(long, env = "WATCH_RESTART_SECS", default_value_t = DEFAULT_WATCH_RESTART_DELAY_SECS)]
    pub watch_restart_secs: u64,

    /// Base period between full-list polls, jittered by 25%
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Port for metrics and health probes
    #[arg(long, env = "METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// IAM REST endpoint
    #[arg(long, env = "IAM_ENDPOINT", default_value = DEFAULT_IAM_ENDPOINT)]
    pub iam_endpoint: String,

    /// Cloud Resource Manager REST endpoint
    #[arg(long, env = "RESOURCE_MANAGER_ENDPOINT", default_value = DEFAULT_RESOURCE_MANAGER_ENDPOINT)]
    pub resource_manager_endpoint: String,

    /// Log format (json, text)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: String,
}

/// Controller-level configuration
///
/// Constructed once at startup and passed explicitly to the reconciler and the
/// IAM service.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub mode: Mode,
    /// Governed cloud project
    pub project_id: String,
    pub ownership: OwnershipPolicy,
    pub key_rotation_after_hours: i64,
    pub purge_keys_after_hours: i64,
    pub allow_disable_key_rotation_override: bool,
    pub watch_secrets: bool,
    pub watch_service_accounts: bool,
    pub watch_timeout_secs: u32,
    pub watch_restart_secs: u64,
    pub poll_interval_secs: u64,
    pub metrics_port: u16,
    pub iam_endpoint: String,
    pub resource_manager_endpoint: String,
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Create,
            project_id: String::new(),
            ownership: OwnershipPolicy::DisplayName(String::new()),
            key_rotation_after_hours: DEFAULT_KEY_ROTATION_AFTER_HOURS,
            purge_keys_after_hours: DEFAULT_PURGE_KEYS_AFTER_HOURS,
            allow_disable_key_rotation_override: false,
            watch_secrets: true,
            watch_service_accounts: false,
            watch_timeout_secs: DEFAULT_WATCH_TIMEOUT_SECS,
            watch_restart_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            iam_endpoint: DEFAULT_IAM_ENDPOINT.to_string(),
            resource_manager_endpoint: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl TryFrom<ControllerArgs> for ControllerConfig {
    type Error = anyhow::Error;

    fn try_from(args: ControllerArgs) -> Result<Self> {
        if args.service_account_project_id.trim().is_empty() {
            bail!("SERVICE_ACCOUNT_PROJECT_ID must not be empty");
        }

        let ownership = match (
            non_empty(args.service_account_prefix),
            non_empty(args.local_project_id),
        ) {
            (Some(prefix), _) => {
                validate_prefix(&prefix)?;
                OwnershipPolicy::Prefix(prefix)
            }
            (None, Some(local_project_id)) => OwnershipPolicy::DisplayName(local_project_id),
            (None, None) => bail!(
                "either SERVICE_ACCOUNT_PREFIX or LOCAL_PROJECT_ID must be set to determine account ownership"
            ),
        };

        if args.key_rotation_after_hours <= 0 || args.purge_keys_after_hours <= 0 {
            bail!("key rotation and purge intervals must be positive");
        }

        if !args.watch_secrets && !args.watch_service_accounts {
            bail!("nothing to reconcile: both WATCH_SECRETS and WATCH_SERVICE_ACCOUNTS are false");
        }

        Ok(Self {
            mode: args.mode,
            project_id: args.service_account_project_id,
            ownership,
            key_rotation_after_hours: args.key_rotation_after_hours,
            purge_keys_after_hours: args.purge_keys_after_hours,
            allow_disable_key_rotation_override: args.allow_disable_key_rotation_override,
            watch_secrets: args.watch_secrets,
            watch_service_accounts: args.watch_service_accounts,
            watch_timeout_secs: args.watch_timeout_secs,
            watch_restart_secs: args.watch_restart_secs,
            poll_interval_secs: args.poll_interval_secs,
            metrics_port: args.metrics_port,
            iam_endpoint: args.iam_endpoint,
            resource_manager_endpoint: args.resource_manager_endpoint,
            log_format: args.log_format,
        })
    }
}

impl ControllerConfig {
    /// Get key rotation interval
    pub fn key_rotation_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.key_rotation_after_hours)
    }

    /// Get key purge threshold
    pub fn purge_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(self.purge_keys_after_hours)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_secs)
    }

    /// Get poll interval duration
    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Longest prefix that still leaves one name character in `{prefix}-{name}-{suffix}`
const MAX_PREFIX_LENGTH: usize = MAX_ACCOUNT_ID_LENGTH - ACCOUNT_ID_SUFFIX_LENGTH - 2 - 1;

/// Prefixes are embedded verbatim in account ids and must survive truncation
fn validate_prefix(prefix: &str) -> Result<()> {
    if !prefix.starts_with(|c: char| c.is_ascii_lowercase())
        || !prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        || prefix.ends_with('-')
    {
        bail!(
            "SERVICE_ACCOUNT_PREFIX '{prefix}' must start with a lowercase letter, \
             contain only lowercase letters, digits and dashes, and not end with a dash"
        );
    }
    if prefix.len() > MAX_PREFIX_LENGTH {
        bail!(
            "SERVICE_ACCOUNT_PREFIX '{prefix}' is {} characters, at most {MAX_PREFIX_LENGTH} are allowed",
            prefix.len()
        );
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
