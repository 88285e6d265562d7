//! Helper utility functions for CLI commands
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tabtrack_core::{config::get_data_dir, Config};
use tabtrack_integrations::BackendClient;
use tabtrack_storage::Database;

pub const RULE: &str = "\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}";

/// Safely truncate a string to a maximum number of characters (not bytes).
/// This avoids panics when slicing multi-byte UTF-8 characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Open the database inside the data directory
pub fn open_database() -> Result<Database> {
    Database::new(Some(get_data_dir()?.join("tabtrack.db")))
}

/// Backend client for the configured URL
pub fn backend_client(config: &Config) -> Result<BackendClient> {
    BackendClient::new(&config.backend_url, config.request_timeout())
}

/// Parse a `YYYY-MM-DD` argument
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{value}', expected YYYY-MM-DD"))
}

pub fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
