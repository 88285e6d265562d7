use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use super::helpers::parse_datetime;
use super::Database;
use crate::models::PendingSync;

impl Database {
    /// Queue a payload that failed to sync. Queuing the same session again
    /// bumps its attempt count instead of adding a duplicate.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub fn enqueue_sync(&self, session_id: &str, payload: &str, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_queue (session_id, payload, attempts, last_error, enqueued_at)
             VALUES (?1, ?2, 1, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                attempts = attempts + 1,
                last_error = ?3",
            params![session_id, payload, error, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Get queued payloads, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupted
    pub fn get_pending_syncs(&self, limit: u32) -> Result<Vec<PendingSync>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, payload, attempts, last_error, enqueued_at
             FROM sync_queue ORDER BY id ASC LIMIT ?1",
        )?;

        let pending = stmt
            .query_map(params![limit], |row| {
                Ok(PendingSync {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    payload: row.get(2)?,
                    attempts: row.get(3)?,
                    last_error: row.get(4)?,
                    enqueued_at: parse_datetime(&row.get::<_, String>(5)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pending)
    }

    /// Record another failed attempt for a queued payload
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails
    pub fn record_sync_failure(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sync_queue SET attempts = attempts + 1, last_error = ?1 WHERE id = ?2",
            params![error, id],
        )?;
        Ok(())
    }

    /// Remove a queued payload (delivered or given up on)
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete operation fails
    pub fn remove_pending_sync(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Number of payloads waiting in the queue
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn count_pending_syncs(&self) -> Result<u32> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(count)
    }
}
