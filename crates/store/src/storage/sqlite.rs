//! SQLite-based email storage and schema migrations

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{EmailStore, StoreError};
use crate::models::{Email, EmailId, NewEmail};

/// Database migrations
///
/// Each migration is applied in order, exactly once. The user_version
/// pragma tracks which migrations have been applied, so the header
/// normalization below can never run a second time.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: emails table. The headers column is the legacy
        // embedded representation: a JSON array of [key, value] pairs.
        M::up(
            r#"
            CREATE TABLE emails (
                id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
                from_addr TEXT NOT NULL,
                to_addr TEXT NOT NULL,
                subject TEXT,
                headers TEXT,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            "#,
        ),
        // Migration 2: normalize headers into their own table, then drop
        // the legacy column.
        //
        // Only elements shaped like a two-element [text, text] array are
        // carried over; rows whose outer value is not an array, empty
        // arrays, bare scalars, wrong-arity pairs, and non-text members
        // are all silently dropped. Scalar elements come out of json_each
        // as plain text, so only array-typed elements (per json_each's
        // type column) may reach the json_* predicates. The column drop
        // is the final, irreversible step.
        M::up(
            r#"
            CREATE TABLE email_headers (
                email_id TEXT NOT NULL REFERENCES emails(id) ON DELETE CASCADE,
                key TEXT NOT NULL,
                value TEXT NOT NULL
            );

            CREATE INDEX idx_email_headers_email_id ON email_headers(email_id);

            INSERT INTO email_headers (email_id, key, value)
            SELECT e.id, json_extract(h.value, '$[0]'), json_extract(h.value, '$[1]')
            FROM (
                SELECT id, headers FROM emails
                WHERE headers IS NOT NULL
                  AND CASE WHEN json_valid(headers)
                           THEN json_type(headers) = 'array'
                           ELSE 0 END
            ) AS e, json_each(e.headers) AS h
            WHERE CASE WHEN h.type = 'array'
                       THEN json_array_length(h.value) = 2
                            AND json_type(h.value, '$[0]') = 'text'
                            AND json_type(h.value, '$[1]') = 'text'
                       ELSE 0 END;

            ALTER TABLE emails DROP COLUMN headers;
            "#,
        ),
    ])
}

/// Map a rusqlite failure to a typed [`StoreError`] where the failure is a
/// constraint the caller can act on.
fn map_constraint(e: rusqlite::Error, email_id: &str) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        match err.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return StoreError::ForeignKey(email_id.to_string()).into();
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => {
                return StoreError::NotNull(e.to_string()).into();
            }
            _ => {}
        }
    }
    e.into()
}

/// Parse a stored RFC 3339 timestamp.
///
/// The store only ever writes RFC 3339, so a parse failure means the
/// column was corrupted; surface it rather than papering over it.
fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let dt = chrono::DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid stored timestamp: {s}"))?;
    Ok(dt.with_timezone(&chrono::Utc))
}

/// SQLite-based email storage
///
/// Owns a single connection behind a mutex; the SMTP and API services
/// share one store instance. Referential integrity and cascade deletion
/// of headers are enforced by the database itself (foreign_keys = ON).
pub struct SqliteEmailStore {
    conn: Mutex<Connection>,
}

impl SqliteEmailStore {
    /// Open (or create) the store at `db_path` and bring the schema up to
    /// date.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store. Used in tests and as a throwaway backend.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL for concurrent readers during writes; foreign_keys must be
        // ON per connection for ON DELETE CASCADE to fire.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        log::info!("email store schema is up to date");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Load the headers of an email, sorted by key for deterministic reads
    fn load_headers(&self, conn: &Connection, email_id: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare(
            "SELECT key, value FROM email_headers WHERE email_id = ? ORDER BY key",
        )?;

        let headers = stmt
            .query_map([email_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(headers)
    }

    /// Insert one header row per pair
    fn save_headers(
        &self,
        conn: &Connection,
        email_id: &str,
        headers: &[(String, String)],
    ) -> Result<()> {
        let mut stmt =
            conn.prepare("INSERT INTO email_headers (email_id, key, value) VALUES (?, ?, ?)")?;

        for (key, value) in headers {
            stmt.execute(params![email_id, key, value])
                .map_err(|e| map_constraint(e, email_id))?;
        }

        Ok(())
    }

    fn load_email(&self, conn: &Connection, id: &str) -> Result<Option<Email>> {
        let row: Option<(String, String, String, Option<String>, String, String, String)> = conn
            .query_row(
                "SELECT id, from_addr, to_addr, subject, body, created_at, updated_at
                 FROM emails WHERE id = ?",
                [id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, from, to, subject, body, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let headers = self.load_headers(conn, &id)?;

        Ok(Some(Email {
            id: EmailId::new(id),
            from,
            to,
            subject,
            headers,
            body,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

impl EmailStore for SqliteEmailStore {
    fn insert_email(&self, email: NewEmail) -> Result<Email> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // The id and both timestamps come from the column defaults
        let (id, created_at, updated_at): (String, String, String) = tx
            .query_row(
                "INSERT INTO emails (from_addr, to_addr, subject, body)
                 VALUES (?, ?, ?, ?)
                 RETURNING id, created_at, updated_at",
                params![email.from, email.to, email.subject, email.body],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| map_constraint(e, "(new)"))?;

        self.save_headers(&tx, &id, &email.headers)?;

        tx.commit()?;

        // Reads return headers sorted by key; hand back the same order
        let mut headers = email.headers;
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Email {
            id: EmailId::new(id),
            from: email.from,
            to: email.to,
            subject: email.subject,
            headers,
            body: email.body,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn get_email(&self, id: &EmailId) -> Result<Option<Email>> {
        let conn = self.conn.lock().unwrap();
        self.load_email(&conn, id.as_str())
    }

    fn list_emails(&self, limit: usize, offset: usize) -> Result<Vec<Email>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, from_addr, to_addr, subject, body, created_at, updated_at
             FROM emails
             ORDER BY created_at DESC
             LIMIT ? OFFSET ?",
        )?;

        let rows: Vec<(String, String, String, Option<String>, String, String, String)> = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut emails = Vec::with_capacity(rows.len());
        for (id, from, to, subject, body, created_at, updated_at) in rows {
            let headers = self.load_headers(&conn, &id)?;
            emails.push(Email {
                id: EmailId::new(id),
                from,
                to,
                subject,
                headers,
                body,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }

        Ok(emails)
    }

    fn update_email(&self, id: &EmailId, subject: Option<&str>, body: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                "UPDATE emails
                 SET subject = ?, body = ?,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?",
                params![subject, body, id.as_str()],
            )
            .map_err(|e| map_constraint(e, id.as_str()))?;

        Ok(changed > 0)
    }

    fn replace_headers(&self, id: &EmailId, headers: &[(String, String)]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // An empty replacement would not touch the foreign key, so check
        // the parent row explicitly.
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM emails WHERE id = ?)",
            [id.as_str()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::ForeignKey(id.to_string()).into());
        }

        tx.execute(
            "DELETE FROM email_headers WHERE email_id = ?",
            [id.as_str()],
        )?;
        self.save_headers(&tx, id.as_str(), headers)?;

        tx.commit()?;
        Ok(())
    }

    fn delete_email(&self, id: &EmailId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        // Headers are removed by ON DELETE CASCADE
        let deleted = conn.execute("DELETE FROM emails WHERE id = ?", [id.as_str()])?;

        Ok(deleted > 0)
    }

    fn has_email(&self, id: &EmailId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM emails WHERE id = ?)",
            [id.as_str()],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    fn count_emails(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        // Headers go with their emails via CASCADE
        conn.execute("DELETE FROM emails", [])?;
        Ok(())
    }
}
