//! Email model representing one received message

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a stored email
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailId(pub String);

impl EmailId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EmailId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EmailId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EmailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted email with its headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    /// Store-generated identifier, immutable for the record's lifetime
    pub id: EmailId,
    /// Sender address as given in the envelope
    pub from: String,
    /// Recipient address as given in the envelope
    pub to: String,
    /// Subject line, if the message had one
    pub subject: Option<String>,
    /// RFC-style header lines, one (key, value) pair per line.
    /// Repeated keys are legitimate (e.g. multiple Received lines).
    pub headers: Vec<(String, String)>,
    /// Message body
    pub body: String,
    /// When the row was created (store default)
    pub created_at: DateTime<Utc>,
    /// When the row was last written. The schema does not refresh this on
    /// its own; [`crate::storage::EmailStore::update_email`] does.
    pub updated_at: DateTime<Utc>,
}

/// An email as received, before the store assigns identity and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmail {
    pub from: String,
    pub to: String,
    pub subject: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl NewEmail {
    /// Create a new email with just the required fields
    pub fn new(from: impl Into<String>, to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: None,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Set the subject line
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Append a header line
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Build a `NewEmail` from envelope addresses and the raw message lines
    /// as delivered after `DATA`.
    ///
    /// Headers run up to the first empty line. A header line splits on the
    /// first colon, with key and value trimmed; a line without a colon
    /// continues the previous header's value. Everything after the blank
    /// line is the body, with lines joined by CRLF. The subject is taken
    /// from the parsed headers, matching the key case-insensitively.
    pub fn from_raw(
        from: impl Into<String>,
        to: impl Into<String>,
        lines: &[String],
    ) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut body = String::new();
        let mut in_headers = true;

        for line in lines {
            if in_headers {
                if line.is_empty() {
                    in_headers = false;
                    continue;
                }

                if let Some((key, value)) = line.split_once(':') {
                    headers.push((key.trim().to_string(), value.trim().to_string()));
                } else if let Some(last) = headers.last_mut() {
                    // No colon: continuation of the previous header
                    last.1.push('\n');
                    last.1.push_str(line);
                } else {
                    headers.push((line.clone(), String::new()));
                }
            } else {
                body.push_str(line);
                body.push_str("\r\n");
            }
        }

        let subject = headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("Subject"))
            .map(|(_, value)| value.clone());

        Self {
            from: from.into(),
            to: to.into(),
            subject,
            headers,
            body,
        }
    }
}
