//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client and IAM backend setup.

use crate::config::{ControllerArgs, ControllerConfig, SharedControllerConfig};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::provider::gcp::{IamREST, IamService};
use crate::provider::IamBackend;
use crate::runtime::shutdown::Drain;
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "gcp_service_account_controller=info";

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Immutable controller configuration
    pub controller_config: SharedControllerConfig,
    /// IAM backend shared by every reconciler
    pub iam: Arc<dyn IamBackend>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Tracks in-flight reconciliations for shutdown
    pub drain: Drain,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("controller_config", &self.controller_config)
            .field(
                "server_ready",
                &self
                    .server_state
                    .is_ready
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Configuration validation
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - IAM backend creation
///
/// Any failure here is fatal to the process.
pub async fn initialize(args: ControllerArgs) -> Result<InitializationResult> {
    // Configure rustls crypto provider FIRST, before any other operations
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|existing| anyhow!("Failed to install rustls crypto provider, one is already set: {existing:?}"))?;

    init_tracing(&args.log_format);

    info!("Starting GCP Service Account Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let controller_config: SharedControllerConfig = Arc::new(
        ControllerConfig::try_from(args).context("Invalid controller configuration")?,
    );
    info!(
        "Mode: {}, project: {}, ownership: {:?}, rotation after {}h, purge after {}h",
        controller_config.mode.as_str(),
        controller_config.project_id,
        controller_config.ownership,
        controller_config.key_rotation_after_hours,
        controller_config.purge_keys_after_hours
    );

    // Initialize metrics
    observability::metrics::register_metrics()?;

    // Create server state; ready is set once the event sources run
    let server_state = Arc::new(ServerState::default());

    // Start HTTP server for metrics and probes
    let server_state_clone = server_state.clone();
    let server_port = controller_config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    // Create IAM backend
    let rest = IamREST::new(
        &controller_config.iam_endpoint,
        &controller_config.resource_manager_endpoint,
    )
    .await
    .context("Failed to create GCP IAM client")?;
    let iam: Arc<dyn IamBackend> = Arc::new(IamService::new(rest, &controller_config)?);

    info!("Controller initialized, starting event sources...");

    Ok(InitializationResult {
        client,
        controller_config,
        iam,
        server_state,
        drain: Drain::default(),
    })
}

/// Set up the tracing subscriber, JSON unless `LOG_FORMAT=text`
fn init_tracing(log_format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let result = if log_format.eq_ignore_ascii_case("text") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(env_filter)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}
