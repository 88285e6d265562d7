/// Sync queue command handler
use anyhow::Result;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tabtrack_core::{AggregationStore, Config, SessionFinalizer};
use tabtrack_integrations::SessionSink;

use super::helpers::{backend_client, open_database, truncate_str};

#[derive(Tabled)]
struct PendingRow {
    #[tabled(rename = "Session")]
    session_id: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
    #[tabled(rename = "Last error")]
    last_error: String,
}

/// Push every queued session to the backend once
pub async fn handle_sync_retry() -> Result<()> {
    let config = Config::load()?;
    if !config.sync_enabled {
        println!("Sync is disabled in config.toml");
        return Ok(());
    }

    let db = Arc::new(open_database()?);
    let pending = db.get_pending_syncs(u32::MAX)?;
    if pending.is_empty() {
        println!("Nothing to sync.");
        return Ok(());
    }

    println!("Retrying {} queued sessions against {}...", pending.len(), config.backend_url);
    let rows: Vec<PendingRow> = pending
        .into_iter()
        .map(|p| PendingRow {
            session_id: p.session_id,
            attempts: p.attempts,
            last_error: truncate_str(p.last_error.as_deref().unwrap_or("-"), 50),
        })
        .collect();
    println!("{}", Table::new(rows));

    let sink: Arc<dyn SessionSink> = Arc::new(backend_client(&config)?);
    let store = Arc::new(AggregationStore::new(db.clone(), config.retention_days));
    let user_id = db.get_or_create_user_id()?;
    let finalizer = SessionFinalizer::new(db, store, Some(sink), user_id);

    let report = finalizer.retry_pending().await?;
    println!("\nSync complete!");
    println!("  Attempted: {}", report.attempted);
    println!("  Delivered: {}", report.delivered);
    println!("  Dropped:   {}", report.dropped);
    println!("  Remaining: {}", report.remaining);
    Ok(())
}
