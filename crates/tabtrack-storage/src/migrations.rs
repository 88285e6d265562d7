use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Sessions table - one row per ended browsing session
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            tab_id INTEGER NOT NULL,
            domain TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            time_spent_active_ms INTEGER NOT NULL,
            time_spent_idle_ms INTEGER NOT NULL,
            keystrokes INTEGER NOT NULL,
            mouse_movements INTEGER NOT NULL,
            scrolls INTEGER NOT NULL,
            clicks INTEGER NOT NULL,
            distractions INTEGER NOT NULL,
            focus_score INTEGER NOT NULL,
            activity_score INTEGER NOT NULL,
            final_focus_score INTEGER NOT NULL,
            productivity_score INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time)",
        [],
    )?;

    // Daily aggregates - rollup per local calendar date
    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_aggregates (
            date TEXT PRIMARY KEY,
            total_time_ms INTEGER NOT NULL,
            productive_time_ms INTEGER NOT NULL,
            session_count INTEGER NOT NULL,
            average_focus REAL NOT NULL,
            categories TEXT NOT NULL
        )",
        [],
    )?;

    // Settings table - single row of user toggles
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            focus_mode INTEGER NOT NULL,
            break_reminders INTEGER NOT NULL,
            deep_work_mode INTEGER NOT NULL,
            pomodoro_timer INTEGER NOT NULL,
            block_distractions INTEGER NOT NULL,
            track_mouse_movement INTEGER NOT NULL,
            track_keystrokes INTEGER NOT NULL,
            idle_threshold INTEGER NOT NULL,
            break_interval INTEGER NOT NULL,
            pomodoro_length INTEGER NOT NULL
        )",
        [],
    )?;

    // Domain overrides - user-defined categories checked before built-in rules
    conn.execute(
        "CREATE TABLE IF NOT EXISTS domain_overrides (
            domain TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Sync queue - payloads that failed to reach the backend
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL UNIQUE,
            payload TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 1,
            last_error TEXT,
            enqueued_at TEXT NOT NULL
        )",
        [],
    )?;

    // Meta table - small key/value facts such as the generated user id
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('sessions', 'daily_aggregates', 'settings',
                              'domain_overrides', 'sync_queue', 'meta')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }
}
