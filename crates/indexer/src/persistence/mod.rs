//! # Persistence
//!
//! The [`Store`] boundary and its sqlite implementation.

pub mod entities;
pub mod sqlite_store;
pub mod store;

pub use entities::*;
pub use sqlite_store::SqliteStore;
pub use store::Store;
