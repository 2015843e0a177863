//! # Runtime
//!
//! Controller runtime: initialization, the watch and poll event sources,
//! watch error handling and graceful shutdown.

pub mod error_policy;
pub mod initialization;
pub mod jitter;
pub mod poll_loop;
pub mod shutdown;
pub mod watch_loop;
