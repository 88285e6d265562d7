use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

use super::helpers::parse_date;
use super::sessions::insert_session;
use super::Database;
use crate::models::{Category, DailyAggregate, Session};

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn aggregate_from_row(row: &Row<'_>) -> rusqlite::Result<DailyAggregate> {
    let categories_json: String = row.get(5)?;
    let categories: BTreeMap<Category, i64> =
        serde_json::from_str(&categories_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(DailyAggregate {
        date: parse_date(&row.get::<_, String>(0)?)?,
        total_time_ms: row.get(1)?,
        productive_time_ms: row.get(2)?,
        session_count: row.get(3)?,
        average_focus: row.get(4)?,
        categories,
    })
}

fn load_aggregate(conn: &Connection, date: NaiveDate) -> Result<Option<DailyAggregate>> {
    let aggregate = conn
        .query_row(
            "SELECT date, total_time_ms, productive_time_ms, session_count, average_focus, categories
             FROM daily_aggregates WHERE date = ?1",
            params![format_date(date)],
            aggregate_from_row,
        )
        .optional()?;
    Ok(aggregate)
}

fn store_aggregate(conn: &Connection, aggregate: &DailyAggregate) -> Result<()> {
    let categories_json = serde_json::to_string(&aggregate.categories)?;
    conn.execute(
        "INSERT INTO daily_aggregates
         (date, total_time_ms, productive_time_ms, session_count, average_focus, categories)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(date) DO UPDATE SET
            total_time_ms = ?2,
            productive_time_ms = ?3,
            session_count = ?4,
            average_focus = ?5,
            categories = ?6",
        params![
            format_date(aggregate.date),
            aggregate.total_time_ms,
            aggregate.productive_time_ms,
            aggregate.session_count,
            aggregate.average_focus,
            categories_json,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Get the aggregate for one calendar date
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is corrupted
    pub fn get_daily_aggregate(&self, date: NaiveDate) -> Result<Option<DailyAggregate>> {
        let conn = self.conn()?;
        load_aggregate(&conn, date)
    }

    /// Get aggregates for an inclusive date range, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupted
    pub fn get_daily_aggregates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAggregate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT date, total_time_ms, productive_time_ms, session_count, average_focus, categories
             FROM daily_aggregates
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY date ASC",
        )?;

        let aggregates = stmt
            .query_map(
                params![format_date(from), format_date(to)],
                aggregate_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(aggregates)
    }

    /// Store an ended session and fold it into its daily aggregate in one
    /// transaction. `apply` receives the existing aggregate for `date` (or a
    /// fresh one) and mutates it; the result is written back and returned.
    ///
    /// # Errors
    ///
    /// Returns an error if any read or write in the transaction fails
    pub fn record_session<F>(
        &self,
        session: &Session,
        date: NaiveDate,
        apply: F,
    ) -> Result<DailyAggregate>
    where
        F: FnOnce(&mut DailyAggregate),
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        insert_session(&tx, session)?;
        let mut aggregate = load_aggregate(&tx, date)?.unwrap_or_else(|| DailyAggregate::new(date));
        apply(&mut aggregate);
        store_aggregate(&tx, &aggregate)?;

        tx.commit()?;
        Ok(aggregate)
    }

    /// Delete aggregates for dates before the cutoff
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete operation fails
    pub fn delete_daily_aggregates_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn.execute(
            "DELETE FROM daily_aggregates WHERE date < ?1",
            params![format_date(cutoff)],
        )?;
        Ok(count)
    }
}
