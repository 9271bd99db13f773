//! In-memory storage implementation
//!
//! Used for tests and as a stub backend where no database file is wanted.
//! Mirrors the referential behavior of the SQLite store: headers cannot
//! outlive their email, and replacing headers of an unknown email fails.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{EmailStore, StoreError};
use crate::models::{Email, EmailId, NewEmail};

/// In-memory implementation of EmailStore
///
/// Emails own their headers directly, so cascade deletion is implicit.
pub struct InMemoryEmailStore {
    emails: RwLock<HashMap<String, Email>>,
}

impl InMemoryEmailStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            emails: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryEmailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailStore for InMemoryEmailStore {
    fn insert_email(&self, email: NewEmail) -> Result<Email> {
        // Same header order as the SQLite backend's reads
        let mut headers = email.headers;
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let now = chrono::Utc::now();
        let stored = Email {
            id: EmailId::new(uuid::Uuid::new_v4().to_string()),
            from: email.from,
            to: email.to,
            subject: email.subject,
            headers,
            body: email.body,
            created_at: now,
            updated_at: now,
        };

        let mut emails = self.emails.write().unwrap();
        emails.insert(stored.id.as_str().to_string(), stored.clone());
        Ok(stored)
    }

    fn get_email(&self, id: &EmailId) -> Result<Option<Email>> {
        let emails = self.emails.read().unwrap();
        Ok(emails.get(id.as_str()).cloned())
    }

    fn list_emails(&self, limit: usize, offset: usize) -> Result<Vec<Email>> {
        let emails = self.emails.read().unwrap();
        let mut list: Vec<_> = emails.values().cloned().collect();

        // Newest first
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(list.into_iter().skip(offset).take(limit).collect())
    }

    fn update_email(&self, id: &EmailId, subject: Option<&str>, body: &str) -> Result<bool> {
        let mut emails = self.emails.write().unwrap();

        let Some(email) = emails.get_mut(id.as_str()) else {
            return Ok(false);
        };

        email.subject = subject.map(|s| s.to_string());
        email.body = body.to_string();
        email.updated_at = chrono::Utc::now();
        Ok(true)
    }

    fn replace_headers(&self, id: &EmailId, headers: &[(String, String)]) -> Result<()> {
        let mut emails = self.emails.write().unwrap();

        let Some(email) = emails.get_mut(id.as_str()) else {
            return Err(StoreError::ForeignKey(id.to_string()).into());
        };

        let mut headers = headers.to_vec();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        email.headers = headers;
        Ok(())
    }

    fn delete_email(&self, id: &EmailId) -> Result<bool> {
        let mut emails = self.emails.write().unwrap();
        Ok(emails.remove(id.as_str()).is_some())
    }

    fn has_email(&self, id: &EmailId) -> Result<bool> {
        let emails = self.emails.read().unwrap();
        Ok(emails.contains_key(id.as_str()))
    }

    fn count_emails(&self) -> Result<usize> {
        let emails = self.emails.read().unwrap();
        Ok(emails.len())
    }

    fn clear(&self) -> Result<()> {
        let mut emails = self.emails.write().unwrap();
        emails.clear();
        Ok(())
    }
}
