//! # Configuration
//!
//! Process-level configuration, parsed once at startup and shared read-only.
//!
//! - `controller`: operating mode, governed project, rotation/purge thresholds
//!   and event source timings

pub mod controller;

pub use controller::{ControllerArgs, ControllerConfig, Mode, OwnershipPolicy, SharedControllerConfig};
