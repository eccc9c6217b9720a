//! # Persistence Plumbing
//!
//! Connection pool lifecycle shared by the indexer's store implementations.

pub mod connection;

pub use connection::*;
