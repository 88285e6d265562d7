//! Database operations split into domain-specific modules.
//!
//! This module re-exports the main Database struct and all its operations.

mod daily;
mod helpers;
mod overrides;
mod sessions;
mod settings;
mod sync_queue;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::migrations;

/// Database connection wrapper
///
/// The connection sits behind a mutex so a single `Arc<Database>` can be
/// shared between the event loop and the persistence tasks.
pub struct Database {
    conn: Mutex<Connection>,
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

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a throwaway database that lives only in memory
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrations::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get default database path
    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("tabtrack");
        path.push("tabtrack.db");
        path
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection mutex poisoned"))
    }

    /// Get the persistent user id, generating one on first use
    ///
    /// # Errors
    ///
    /// Returns an error if the database query or insert operation fails
    pub fn get_or_create_user_id(&self) -> Result<String> {
        let conn = self.conn()?;
        let existing: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'user_id'", [], |row| {
                row.get(0)
            })
            .optional()?;

        if let Some(user_id) = existing {
            return Ok(user_id);
        }

        let user_id = generate_id("user");
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('user_id', ?1)",
            params![user_id],
        )?;
        log::info!("Generated user id {user_id}");
        Ok(user_id)
    }
}

/// Build an opaque `<prefix>_<epoch-ms>_<random>` identifier
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &random[..9]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_is_stable() {
        let db = Database::in_memory().unwrap();
        let first = db.get_or_create_user_id().unwrap();
        let second = db.get_or_create_user_id().unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("user_"));
    }

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id("session");
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tabtrack.db");

        let user_id = {
            let db = Database::new(Some(path.clone())).unwrap();
            db.get_or_create_user_id().unwrap()
        };

        let reopened = Database::new(Some(path)).unwrap();
        assert_eq!(reopened.get_or_create_user_id().unwrap(), user_id);
    }
}
