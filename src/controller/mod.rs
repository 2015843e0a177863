//! # Controller
//!
//! Core controller modules for the GCP Service Account Controller.
//!
//! - `desired`: desired state extracted from annotations
//! - `state`: persisted state codec (state annotation)
//! - `resource`: capabilities of the managed kinds (`Secret`, `ServiceAccount`)
//! - `store`: Kubernetes resource store (get, replace, list, watch)
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod desired;
pub mod reconciler;
pub mod resource;
pub mod server;
pub mod state;
pub mod store;
