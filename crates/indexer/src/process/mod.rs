//! # Process Runner
//!
//! Executes external commands with a hard per-attempt timeout and
//! exponential-backoff retries. Used for every invocation of the validator
//! listing tool; it has no knowledge of what the command does.

mod backoff;
mod runner;

pub use backoff::*;
pub use runner::*;
