use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::Database;
use crate::models::{UsageRecord, UsageTotal};

impl Database {
    // ==================== Usage Methods ====================

    /// Insert a usage sample
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert operation fails
    pub fn insert_usage_record(&self, record: &UsageRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO usage_samples (id, package, duration_ms, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id.to_string(),
                record.package,
                record.duration_ms,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Per-package totals since `since` (all time when `None`), largest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_usage_totals(&self, since: Option<DateTime<Utc>>) -> Result<Vec<UsageTotal>> {
        let since = since.map_or_else(String::new, |s| s.to_rfc3339());
        let mut stmt = self.conn.prepare(
            "SELECT package, SUM(duration_ms), COUNT(*)
             FROM usage_samples
             WHERE recorded_at >= ?1
             GROUP BY package
             ORDER BY SUM(duration_ms) DESC, package ASC",
        )?;

        let totals = stmt
            .query_map(params![since], |row| {
                Ok(UsageTotal {
                    package: row.get(0)?,
                    total_ms: row.get(1)?,
                    sample_count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, UsageRecord};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_usage_totals_grouped_and_sorted() {
        let db = Database::in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        db.insert_usage_record(&UsageRecord::new("com.a".to_string(), 1_500, at))
            .unwrap();
        db.insert_usage_record(&UsageRecord::new("com.b".to_string(), 9_000, at))
            .unwrap();
        db.insert_usage_record(&UsageRecord::new("com.a".to_string(), 2_500, at))
            .unwrap();

        let totals = db.get_usage_totals(None).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].package, "com.b");
        assert_eq!(totals[0].total_ms, 9_000);
        assert_eq!(totals[1].package, "com.a");
        assert_eq!(totals[1].total_ms, 4_000);
        assert_eq!(totals[1].sample_count, 2);
    }

    #[test]
    fn test_usage_totals_since_filters_old_rows() {
        let db = Database::in_memory().unwrap();
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let recent = old + Duration::days(3);

        db.insert_usage_record(&UsageRecord::new("com.a".to_string(), 5_000, old))
            .unwrap();
        db.insert_usage_record(&UsageRecord::new("com.a".to_string(), 2_000, recent))
            .unwrap();

        let totals = db.get_usage_totals(Some(old + Duration::days(1))).unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total_ms, 2_000);
    }
}
