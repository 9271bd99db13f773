//! Storage traits and implementations
//!
//! This module defines the storage abstraction for email records. The
//! trait-based design allows swapping between the in-memory and SQLite
//! implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryEmailStore;
pub use sqlite::SqliteEmailStore;
pub use traits::{EmailStore, StoreError};
