//! Database operations split into domain-specific modules.
//!
//! This module re-exports the main Database struct and all its operations.

pub(crate) mod helpers;
mod settings;
mod usage;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::migrations;

/// Database connection wrapper
///
/// `Connection` is `Send` but not `Sync`; share it across tasks as
/// `Arc<Mutex<Database>>`.
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Create a new database connection
    ///
    /// # Errors
    ///
    /// Returns an error if database directory creation, connection opening, or schema initialization fails
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(Self::default_db_path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database connection")?;
        migrations::init_schema(&conn)?;

        log::info!("Database initialized at: {}", path.display());

        Ok(Self { conn })
    }

    /// Open a throwaway in-memory database
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrations::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Database path inside a given data directory
    #[must_use]
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join("warden.db")
    }

    /// Get default database path
    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("warden");
        Self::path_in(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("warden.db");

        let db = Database::new(Some(path.clone())).unwrap();
        drop(db);

        assert!(path.exists());
    }

    #[test]
    fn test_path_in() {
        let path = Database::path_in(Path::new("/tmp/warden"));
        assert_eq!(path, PathBuf::from("/tmp/warden/warden.db"));
    }
}
