//! # Poll Loop
//!
//! Periodic full listing of one managed kind. Catches anything the watch
//! stream missed and drives time based work (rotation, purge) on resources
//! that never change.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::{Initiator, Reconciler};
use crate::controller::resource::ManagedResource;
use crate::controller::store::ResourceStore;
use crate::observability;
use crate::runtime::jitter::apply_jitter;
use crate::runtime::shutdown::Drain;
use std::sync::Arc;
use tracing::{error, info, Instrument};

/// Run the poll loop for `K` until the process exits
pub async fn run_poll_loop<K: ManagedResource>(
    store: Arc<dyn ResourceStore<K>>,
    reconciler: Arc<Reconciler<K>>,
    controller_config: SharedControllerConfig,
    drain: Drain,
) {
    let interval = controller_config.poll_interval_duration();
    info!(
        "Starting {} poll loop (interval: {}s)",
        K::KIND,
        interval.as_secs()
    );

    // The watcher's initial listing covers startup
    tokio::time::sleep(apply_jitter(interval)).await;

    loop {
        let poll_span = tracing::info_span!(
            "controller.poll",
            resource.kind = K::KIND,
            operation = "poll_loop"
        );
        poll_once(store.as_ref(), &reconciler, &drain)
            .instrument(poll_span)
            .await;
        tokio::time::sleep(apply_jitter(interval)).await;
    }
}

/// List every resource of `K` and reconcile each in turn
///
/// Returns the number of resources reconciled; a failed listing reconciles
/// nothing and is retried on the next cycle.
pub async fn poll_once<K: ManagedResource>(
    store: &dyn ResourceStore<K>,
    reconciler: &Reconciler<K>,
    drain: &Drain,
) -> usize {
    observability::metrics::increment_poll_cycles(K::KIND);

    let resources = match store.list().await {
        Ok(resources) => resources,
        Err(e) => {
            error!("Failed to list {} resources: {:#}", K::KIND, e);
            return 0;
        }
    };

    let count = resources.len();
    for resource in resources {
        let _pass = drain.track().await;
        reconciler.reconcile(resource, Initiator::Poller).await;
    }
    info!("Poll cycle reconciled {} {} resources", count, K::KIND);
    count
}
