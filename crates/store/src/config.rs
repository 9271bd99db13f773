//! Database location resolution
//!
//! The store lives in the platform data directory by default
//! (e.g. `~/.local/share/mailstore/mail.sqlite`). Set `MAILSTORE_DB` to
//! point services at a different database file.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Database filename inside the mailstore data directory
const DB_FILE: &str = "mail.sqlite";

/// Environment variable overriding the database path
const ENV_DB_PATH: &str = "MAILSTORE_DB";

/// Get the mailstore data directory (e.g. ~/.local/share/mailstore/)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mailstore"))
}

/// Ensure the mailstore data directory exists
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = data_dir().context("Could not determine data directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    Ok(dir)
}

/// Resolve the database path.
///
/// `MAILSTORE_DB` wins if set; otherwise the default location under the
/// platform data directory is used (and the directory created if missing).
pub fn database_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        return Ok(PathBuf::from(path));
    }
    Ok(ensure_data_dir()?.join(DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir() {
        let dir = data_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("mailstore"));
    }

    #[test]
    fn test_default_database_filename() {
        let dir = data_dir().unwrap();
        assert!(dir.join(DB_FILE).ends_with("mailstore/mail.sqlite"));
    }
}
