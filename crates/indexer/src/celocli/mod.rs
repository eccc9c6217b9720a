//! # Validator Tool Client
//!
//! Typed access to the external validator-listing tool (`celocli`):
//! command construction, JSON extraction from banner-polluted stdout,
//! metadata pointer parsing and primary/fallback node selection.

mod client;
mod nodes;
mod parse;
mod types;

pub use client::*;
pub use nodes::*;
pub use parse::*;
pub use types::*;
