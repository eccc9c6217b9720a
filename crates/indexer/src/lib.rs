//! # RPC Indexer
//!
//! Keeps a validator directory in sync with the chain and periodically
//! measures the health of every elected validator's JSON-RPC endpoint.

pub mod celocli;
pub mod cli;
pub mod config;
pub mod context;
pub mod metrics;
pub mod monitor;
pub mod persistence;
pub mod process;
pub mod rpc;
pub mod util;

// Main public API exports
pub use cli::{Args, Cli, Command, CommandHandler};
pub use config::IndexerConfig;
pub use context::IndexerContext;
pub use metrics::{IndexerMetrics, IndexerPrometheusMetrics};
pub use monitor::{CycleError, CycleSummary, RpcMonitor};
pub use persistence::{SqliteStore, Store};

/// Re-export common error types
pub use common::error::IndexerError;

/// Indexer library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
