use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::helpers::{parse_category, parse_datetime};
use super::Database;
use crate::models::Session;

const SESSION_COLUMNS: &str = "session_id, tab_id, domain, url, title, category, start_time, end_time,
     duration_ms, time_spent_active_ms, time_spent_idle_ms, keystrokes, mouse_movements,
     scrolls, clicks, distractions, focus_score, activity_score, final_focus_score,
     productivity_score";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        tab_id: row.get(1)?,
        domain: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        category: parse_category(&row.get::<_, String>(5)?)?,
        start_time: parse_datetime(&row.get::<_, String>(6)?)?,
        end_time: parse_datetime(&row.get::<_, String>(7)?)?,
        duration_ms: row.get(8)?,
        time_spent_active_ms: row.get(9)?,
        time_spent_idle_ms: row.get(10)?,
        keystrokes: row.get(11)?,
        mouse_movements: row.get(12)?,
        scrolls: row.get(13)?,
        clicks: row.get(14)?,
        distractions: row.get(15)?,
        focus_score: row.get(16)?,
        activity_score: row.get(17)?,
        final_focus_score: row.get(18)?,
        productivity_score: row.get(19)?,
    })
}

/// Insert (or replace) an ended session using an already-locked connection
pub(crate) fn insert_session(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO sessions ({SESSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
        ),
        params![
            session.session_id,
            session.tab_id,
            session.domain,
            session.url,
            session.title,
            session.category.as_str(),
            session.start_time.to_rfc3339(),
            session.end_time.to_rfc3339(),
            session.duration_ms,
            session.time_spent_active_ms,
            session.time_spent_idle_ms,
            session.keystrokes,
            session.mouse_movements,
            session.scrolls,
            session.clicks,
            session.distractions,
            session.focus_score,
            session.activity_score,
            session.final_focus_score,
            session.productivity_score,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Get a single session by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is corrupted
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
                params![session_id],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Get sessions that ended within a time range, oldest first. Sessions
    /// are filed under the day they end, so this lines up with the daily
    /// aggregates.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupted
    pub fn get_sessions(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE end_time >= ?1 AND end_time < ?2
             ORDER BY end_time ASC"
        ))?;

        let sessions = stmt
            .query_map(
                params![start.to_rfc3339(), end.to_rfc3339()],
                session_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Get the most recently ended sessions, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupted
    pub fn get_recent_sessions(&self, limit: u32) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY end_time DESC LIMIT ?1"
        ))?;

        let sessions = stmt
            .query_map(params![limit], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Delete sessions that started before the cutoff
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete operation fails
    pub fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn.execute(
            "DELETE FROM sessions WHERE start_time < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(count)
    }
}
