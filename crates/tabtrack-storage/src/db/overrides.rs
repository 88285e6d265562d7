use anyhow::Result;
use rusqlite::params;

use super::helpers::{parse_category, parse_datetime};
use super::Database;
use crate::models::DomainOverride;

impl Database {
    /// Insert or replace a user-defined domain category
    ///
    /// # Errors
    ///
    /// Returns an error if the database upsert operation fails
    pub fn upsert_domain_override(&self, entry: &DomainOverride) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO domain_overrides (domain, category, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(domain) DO UPDATE SET category = ?2",
            params![
                entry.domain,
                entry.category.as_str(),
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get all domain overrides ordered by domain
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupted
    pub fn get_domain_overrides(&self) -> Result<Vec<DomainOverride>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain, category, created_at FROM domain_overrides ORDER BY domain",
        )?;

        let entries = stmt
            .query_map([], |row| {
                Ok(DomainOverride {
                    domain: row.get(0)?,
                    category: parse_category(&row.get::<_, String>(1)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Delete the override for a domain, returning whether one existed
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete operation fails
    pub fn delete_domain_override(&self, domain: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count = conn.execute(
            "DELETE FROM domain_overrides WHERE domain = ?1",
            params![domain],
        )?;
        Ok(count > 0)
    }
}
