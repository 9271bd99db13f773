//! Storage trait and error definitions

use crate::models::{Email, EmailId, NewEmail};
use anyhow::Result;

/// Constraint failures a caller can act on.
///
/// Backends wrap these in `anyhow::Error`; callers that need to tell a
/// constraint failure apart from an IO failure can downcast.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A header referenced an email that does not exist
    #[error("no such email: {0}")]
    ForeignKey(String),
    /// A required field was missing a value
    #[error("missing required field: {0}")]
    NotNull(String),
}

/// Trait for email storage operations
///
/// This trait abstracts over storage backends and provides the operations
/// the ingestion and API services need: atomic insert of a message with
/// its headers, joined reads, caller-driven updates, and cascade delete.
pub trait EmailStore: Send + Sync {
    /// Persist a received email and its headers as one atomic unit.
    ///
    /// The identifier and both timestamps are generated by the store.
    /// A concurrent reader never sees the email without its headers.
    ///
    /// Storage keeps no header order; every `Email` handed out (here and
    /// by the read operations) carries its headers sorted by key.
    fn insert_email(&self, email: NewEmail) -> Result<Email>;

    /// Get an email by id, headers included
    fn get_email(&self, id: &EmailId) -> Result<Option<Email>>;

    /// List emails, newest first by creation time, headers included
    fn list_emails(&self, limit: usize, offset: usize) -> Result<Vec<Email>>;

    /// Rewrite the mutable fields of an email and refresh `updated_at`.
    ///
    /// The schema defaults `updated_at` at insert but does not refresh it
    /// on modification; this method is the designated caller-side bump.
    /// Returns false if no email with the given id exists.
    fn update_email(&self, id: &EmailId, subject: Option<&str>, body: &str) -> Result<bool>;

    /// Replace all headers of an email (delete, then insert).
    ///
    /// Headers are never updated in place. Fails with
    /// [`StoreError::ForeignKey`] if the email does not exist.
    fn replace_headers(&self, id: &EmailId, headers: &[(String, String)]) -> Result<()>;

    /// Delete an email; its headers are removed with it by the store.
    /// Returns false if no email with the given id existed.
    fn delete_email(&self, id: &EmailId) -> Result<bool>;

    /// Check if an email exists
    fn has_email(&self, id: &EmailId) -> Result<bool>;

    /// Count stored emails
    fn count_emails(&self) -> Result<usize>;

    /// Clear all data (for testing)
    fn clear(&self) -> Result<()>;
}
