//! # Resource Store
//!
//! Read, replace, list and watch managed resources across all namespaces.
//!
//! [`KubeStore`] is the Kubernetes implementation; the reconciler only sees the
//! [`ResourceStore`] trait so it can run against an in-memory store in tests.

use crate::controller::resource::ManagedResource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, ResourceExt};
use kube_runtime::watcher;
use tracing::debug;

/// A change observed on the watch stream
#[derive(Debug, Clone)]
pub enum StoreEvent<K> {
    /// Added or modified (including the initial listing)
    Applied(K),
    /// Deleted, carrying the last known state
    Deleted(K),
}

#[async_trait]
pub trait ResourceStore<K: ManagedResource>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<K>;

    /// Full replace, subject to the resource version conflict check
    async fn replace(&self, resource: &K) -> Result<K>;

    /// All resources in all namespaces
    async fn list(&self) -> Result<Vec<K>>;

    /// Watch all namespaces; the stream yields an error when the connection breaks
    fn watch(&self) -> BoxStream<'static, Result<StoreEvent<K>>>;
}

/// Kubernetes API backed store
#[derive(Clone)]
pub struct KubeStore<K: ManagedResource> {
    client: Client,
    all: Api<K>,
    watch_timeout_secs: u32,
}

impl<K: ManagedResource> std::fmt::Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("kind", &K::KIND)
            .field("watch_timeout_secs", &self.watch_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl<K: ManagedResource> KubeStore<K> {
    pub fn new(client: Client, watch_timeout_secs: u32) -> Self {
        Self {
            all: Api::all(client.clone()),
            client,
            watch_timeout_secs,
        }
    }

    fn namespaced(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K: ManagedResource> ResourceStore<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        self.namespaced(namespace)
            .get(name)
            .await
            .with_context(|| format!("Failed to get {} {}/{}", K::KIND, namespace, name))
    }

    async fn replace(&self, resource: &K) -> Result<K> {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        self.namespaced(&namespace)
            .replace(&name, &PostParams::default(), resource)
            .await
            .with_context(|| format!("Failed to update {} {}/{}", K::KIND, namespace, name))
    }

    async fn list(&self) -> Result<Vec<K>> {
        let list = self
            .all
            .list(&ListParams::default())
            .await
            .with_context(|| format!("Failed to list {} resources", K::KIND))?;
        debug!("Cluster has {} {} resources", list.items.len(), K::KIND);
        Ok(list.items)
    }

    fn watch(&self) -> BoxStream<'static, Result<StoreEvent<K>>> {
        let config = watcher::Config::default().timeout(self.watch_timeout_secs);
        watcher(self.all.clone(), config)
            .filter_map(|event| async move {
                match event {
                    Ok(watcher::Event::Apply(resource) | watcher::Event::InitApply(resource)) => {
                        Some(Ok(StoreEvent::Applied(resource)))
                    }
                    Ok(watcher::Event::Delete(resource)) => Some(Ok(StoreEvent::Deleted(resource))),
                    Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
                    Err(e) => Some(Err(anyhow::Error::new(e).context("watch stream error"))),
                }
            })
            .boxed()
    }
}
