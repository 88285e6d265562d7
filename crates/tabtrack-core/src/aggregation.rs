use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::sync::Arc;
use tabtrack_storage::{DailyAggregate, Database, Session};

/// Fold one ended session into its day's aggregate
#[allow(clippy::cast_precision_loss)]
pub fn accumulate(aggregate: &mut DailyAggregate, session: &Session) {
    aggregate.total_time_ms += session.duration_ms;
    aggregate.session_count += 1;
    if session.category.is_productive() {
        aggregate.productive_time_ms += session.duration_ms;
    }

    let n = f64::from(aggregate.session_count);
    aggregate.average_focus =
        (aggregate.average_focus * (n - 1.0) + f64::from(session.final_focus_score)) / n;

    *aggregate.categories.entry(session.category).or_insert(0) += session.duration_ms;
}

/// Local calendar date a timestamp falls on; sessions are filed under the
/// date they end
#[must_use]
pub fn local_date(time: DateTime<Utc>) -> NaiveDate {
    time.with_timezone(&Local).date_naive()
}

/// Human-readable duration, `1h 5m` or `42m`
#[must_use]
pub fn format_duration(ms: i64) -> String {
    let minutes = ms.max(0) / 60_000;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

/// What a retention sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions_removed: usize,
    pub aggregates_removed: usize,
}

/// Daily aggregates over the session store
pub struct AggregationStore {
    database: Arc<Database>,
    retention_days: u32,
}

impl AggregationStore {
    #[must_use]
    pub const fn new(database: Arc<Database>, retention_days: u32) -> Self {
        Self {
            database,
            retention_days,
        }
    }

    /// Persist an ended session and update its daily aggregate in one
    /// transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the database transaction fails
    pub fn record(&self, session: &Session) -> Result<DailyAggregate> {
        let date = local_date(session.end_time);
        self.database
            .record_session(session, date, |aggregate| accumulate(aggregate, session))
            .with_context(|| format!("Failed to record session {}", session.session_id))
    }

    /// Aggregate for the given local date, empty if nothing was recorded
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn for_date(&self, date: NaiveDate) -> Result<DailyAggregate> {
        Ok(self
            .database
            .get_daily_aggregate(date)?
            .unwrap_or_else(|| DailyAggregate::new(date)))
    }

    /// Today's aggregate
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn today(&self, now: DateTime<Utc>) -> Result<DailyAggregate> {
        self.for_date(local_date(now))
    }

    /// Remove sessions and aggregates older than the retention window
    ///
    /// # Errors
    ///
    /// Returns an error if a database delete fails
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport> {
        let cutoff = now - Duration::days(i64::from(self.retention_days));
        let report = CleanupReport {
            sessions_removed: self.database.delete_sessions_before(cutoff)?,
            aggregates_removed: self
                .database
                .delete_daily_aggregates_before(local_date(cutoff))?,
        };
        log::info!(
            "Retention sweep removed {} sessions and {} daily aggregates older than {} days",
            report.sessions_removed,
            report.aggregates_removed,
            self.retention_days
        );
        Ok(report)
    }
}
