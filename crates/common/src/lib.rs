//! # Common
//!
//! Shared building blocks for the RPC indexer crates: layered configuration,
//! error taxonomy, logging initialization and the sqlite pool lifecycle.

pub mod config;
pub mod error;
pub mod logging;
pub mod persistence;

pub use config::*;
pub use error::*;

/// Version of the common crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
