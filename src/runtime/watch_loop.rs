//! # Watch Loop
//!
//! Watches one managed kind across all namespaces and reconciles every
//! applied resource. Deleted resources go through the deletion path.
//!
//! The watch session ends on the first stream error or when the API server
//! closes the stream; a new session starts after a jittered delay.

use crate::config::SharedControllerConfig;
use crate::controller::reconciler::{Initiator, Reconciler};
use crate::controller::resource::ManagedResource;
use crate::controller::store::{ResourceStore, StoreEvent};
use crate::observability;
use crate::runtime::error_policy::handle_watch_stream_error;
use crate::runtime::jitter::apply_jitter;
use crate::runtime::shutdown::Drain;
use futures::StreamExt;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the watch loop for `K` until the process exits
pub async fn run_watch_loop<K: ManagedResource>(
    store: Arc<dyn ResourceStore<K>>,
    reconciler: Arc<Reconciler<K>>,
    controller_config: SharedControllerConfig,
    drain: Drain,
) {
    info!("Starting {} watch loop...", K::KIND);

    loop {
        let watch_span = tracing::info_span!(
            "controller.watch",
            resource.kind = K::KIND,
            operation = "watch_loop"
        );
        watch_session(store.as_ref(), &reconciler, &drain)
            .instrument(watch_span)
            .await;

        observability::metrics::increment_watch_restarts(K::KIND);
        let delay = apply_jitter(controller_config.watch_restart_delay_duration());
        warn!(
            "{} watch stream ended, restarting in {} seconds...",
            K::KIND,
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }
}

/// Consume one watch stream until it errors or ends
pub async fn watch_session<K: ManagedResource>(
    store: &dyn ResourceStore<K>,
    reconciler: &Reconciler<K>,
    drain: &Drain,
) {
    let mut events = store.watch();
    while let Some(event) = events.next().await {
        match event {
            Ok(StoreEvent::Applied(resource)) => {
                debug!(
                    "watch.event.applied {}/{}",
                    resource.namespace().unwrap_or_default(),
                    resource.name_any()
                );
                let _pass = drain.track().await;
                reconciler.reconcile(resource, Initiator::Watcher).await;
            }
            Ok(StoreEvent::Deleted(resource)) => {
                debug!(
                    "watch.event.deleted {}/{}",
                    resource.namespace().unwrap_or_default(),
                    resource.name_any()
                );
                let _pass = drain.track().await;
                reconciler.delete(&resource, Initiator::Watcher).await;
            }
            Err(e) => {
                handle_watch_stream_error(K::KIND, &e);
                return;
            }
        }
    }
    debug!("{} watch stream closed by the API server", K::KIND);
}
