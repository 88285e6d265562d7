use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::models::Settings;

impl Database {
    /// Get stored settings, falling back to defaults when none were saved yet
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_settings(&self) -> Result<Settings> {
        let conn = self.conn()?;
        let stored = conn
            .query_row(
                "SELECT focus_mode, break_reminders, deep_work_mode, pomodoro_timer,
                        block_distractions, track_mouse_movement, track_keystrokes,
                        idle_threshold, break_interval, pomodoro_length
                 FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(Settings {
                        focus_mode: row.get::<_, i32>(0)? != 0,
                        break_reminders: row.get::<_, i32>(1)? != 0,
                        deep_work_mode: row.get::<_, i32>(2)? != 0,
                        pomodoro_timer: row.get::<_, i32>(3)? != 0,
                        block_distractions: row.get::<_, i32>(4)? != 0,
                        track_mouse_movement: row.get::<_, i32>(5)? != 0,
                        track_keystrokes: row.get::<_, i32>(6)? != 0,
                        idle_threshold: row.get(7)?,
                        break_interval: row.get(8)?,
                        pomodoro_length: row.get(9)?,
                    })
                },
            )
            .optional()?;

        Ok(stored.unwrap_or_default())
    }

    /// Persist settings, replacing the stored row
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings
             (id, focus_mode, break_reminders, deep_work_mode, pomodoro_timer, block_distractions,
              track_mouse_movement, track_keystrokes, idle_threshold, break_interval, pomodoro_length)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                focus_mode = ?1,
                break_reminders = ?2,
                deep_work_mode = ?3,
                pomodoro_timer = ?4,
                block_distractions = ?5,
                track_mouse_movement = ?6,
                track_keystrokes = ?7,
                idle_threshold = ?8,
                break_interval = ?9,
                pomodoro_length = ?10",
            params![
                i32::from(settings.focus_mode),
                i32::from(settings.break_reminders),
                i32::from(settings.deep_work_mode),
                i32::from(settings.pomodoro_timer),
                i32::from(settings.block_distractions),
                i32::from(settings.track_mouse_movement),
                i32::from(settings.track_keystrokes),
                settings.idle_threshold,
                settings.break_interval,
                settings.pomodoro_length,
            ],
        )?;
        log::debug!("Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_when_empty() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_settings_round_trip_and_overwrite() {
        let db = Database::in_memory().unwrap();
        let mut settings = Settings {
            focus_mode: true,
            block_distractions: true,
            idle_threshold: 60_000,
            ..Settings::default()
        };
        db.save_settings(&settings).unwrap();
        assert_eq!(db.get_settings().unwrap(), settings);

        settings.focus_mode = false;
        db.save_settings(&settings).unwrap();
        assert!(!db.get_settings().unwrap().focus_mode);
    }
}
