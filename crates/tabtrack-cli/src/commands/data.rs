/// Data retention command handler
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tabtrack_core::{AggregationStore, Config};

use super::helpers::open_database;

pub fn handle_cleanup(days: Option<u32>) -> Result<()> {
    let retention_days = match days {
        Some(days) => days,
        None => Config::load()?.retention_days,
    };
    let db = Arc::new(open_database()?);
    let store = AggregationStore::new(db, retention_days);

    let report = store.cleanup(Utc::now())?;
    println!("Removed data older than {retention_days} days:");
    println!("  Sessions:         {}", report.sessions_removed);
    println!("  Daily summaries:  {}", report.aggregates_removed);
    Ok(())
}
