//! # GCP Service Account Controller
//!
//! A Kubernetes controller that provisions Google Cloud IAM service accounts
//! for annotated `Secret` and `ServiceAccount` resources.
//!
//! ## Overview
//!
//! 1. **Provisioning** - creates a service account, or adopts a pre-provisioned one
//! 2. **Key rotation** - writes a fresh JSON key into the Secret on a schedule
//! 3. **Key purging** - deletes old keys once the new one has been picked up
//! 4. **Workload Identity** - annotates ServiceAccounts with the account email
//! 5. **Cleanup** - deletes the account when the resource is deleted
//!
//! Resources are discovered by a watch and a periodic poll, per kind.
//! `/metrics`, `/healthz` and `/readyz` are served on `METRICS_PORT`.

use anyhow::Result;
use clap::Parser;
use gcp_service_account_controller::config::{ControllerArgs, SharedControllerConfig};
use gcp_service_account_controller::controller::reconciler::Reconciler;
use gcp_service_account_controller::controller::resource::ManagedResource;
use gcp_service_account_controller::controller::store::{KubeStore, ResourceStore};
use gcp_service_account_controller::provider::IamBackend;
use gcp_service_account_controller::runtime::initialization::initialize;
use gcp_service_account_controller::runtime::poll_loop::run_poll_loop;
use gcp_service_account_controller::runtime::shutdown::{shutdown_signal, Drain};
use gcp_service_account_controller::runtime::watch_loop::run_watch_loop;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ControllerArgs::parse();
    let init = initialize(args).await?;

    let mut tasks = Vec::new();
    if init.controller_config.watch_secrets {
        tasks.extend(spawn_event_sources::<Secret>(
            &init.client,
            &init.iam,
            &init.controller_config,
            &init.drain,
        ));
    }
    if init.controller_config.watch_service_accounts {
        tasks.extend(spawn_event_sources::<ServiceAccount>(
            &init.client,
            &init.iam,
            &init.controller_config,
            &init.drain,
        ));
    }

    init.server_state.set_ready(true);
    info!("Controller ready, {} event sources running", tasks.len());

    shutdown_signal().await;

    init.server_state.set_ready(false);
    info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    let _drained = init.drain.wait_drained().await;
    for task in &tasks {
        task.abort();
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Start the watch loop and the poll loop for `K`
fn spawn_event_sources<K: ManagedResource>(
    client: &Client,
    iam: &Arc<dyn IamBackend>,
    controller_config: &SharedControllerConfig,
    drain: &Drain,
) -> [JoinHandle<()>; 2] {
    let store: Arc<dyn ResourceStore<K>> = Arc::new(KubeStore::<K>::new(
        client.clone(),
        controller_config.watch_timeout_secs,
    ));
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store),
        Arc::clone(iam),
        Arc::clone(controller_config),
    ));
    info!("Managing {} resources", K::KIND);

    [
        tokio::spawn(run_watch_loop(
            Arc::clone(&store),
            Arc::clone(&reconciler),
            Arc::clone(controller_config),
            drain.clone(),
        )),
        tokio::spawn(run_poll_loop(
            store,
            reconciler,
            Arc::clone(controller_config),
            drain.clone(),
        )),
    ]
}
