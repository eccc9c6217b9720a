//! # Configuration Abstractions
//!
//! Layered configuration loading and the configuration sections shared by
//! all indexer components.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;
