//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use gcp_service_account_controller::prelude::*;
//! ```

// Config types
pub use crate::config::{ControllerConfig, Mode, OwnershipPolicy, SharedControllerConfig};

// Resource capabilities and storage
pub use crate::controller::resource::ManagedResource;
pub use crate::controller::store::{KubeStore, ResourceStore, StoreEvent};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    ActionStatus, Initiator, PassReport, Reconciler, ReconcilerError,
};

// IAM backend
pub use crate::provider::{AccountRef, IamBackend, IamError, KeyMaterial, Permission};
