use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Settings table - single row holding blocker preferences
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            id TEXT PRIMARY KEY,
            is_monitoring INTEGER NOT NULL DEFAULT 0,
            blocked_apps TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    // Usage samples table - one row per reported foreground dwell
    conn.execute(
        "CREATE TABLE IF NOT EXISTS usage_samples (
            id TEXT PRIMARY KEY,
            package TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            recorded_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_usage_samples_recorded_at
         ON usage_samples(recorded_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_usage_samples_package
         ON usage_samples(package)",
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

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('settings', 'usage_samples')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
