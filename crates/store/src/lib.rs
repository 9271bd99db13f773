//! Store crate - Durable storage for a local email development environment
//!
//! This crate provides the persistence layer shared by the ingestion and
//! API services:
//! - Domain models (Email, NewEmail, EmailId)
//! - Versioned SQLite schema migrations, including the one-time
//!   normalization of embedded headers into their own table
//! - Storage trait abstraction with SQLite-backed and in-memory backends
//! - Database location resolution
//!
//! This crate has no network or UI dependencies; the SMTP and HTTP
//! services sit on top of it.

pub mod config;
pub mod models;
pub mod storage;

pub use models::{Email, EmailId, NewEmail};
pub use storage::{EmailStore, InMemoryEmailStore, SqliteEmailStore, StoreError};
