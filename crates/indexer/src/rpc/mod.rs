//! # JSON-RPC
//!
//! Minimal JSON-RPC 2.0 client shared by the health prober and the chain
//! height source. Failures are classified into [`RpcErrorKind`] so callers
//! never inspect HTTP library errors.

mod chain;
mod client;

pub use chain::*;
pub use client::*;
