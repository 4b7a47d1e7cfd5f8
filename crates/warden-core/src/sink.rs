use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use warden_storage::{Database, UsageRecord};

use crate::usage::UsageSample;

/// Receives usage samples; fire-and-forget, no acknowledgement
pub trait UsageSink: Send + Sync {
    fn record(&self, sample: &UsageSample, at: DateTime<Utc>);
}

/// Only logs samples
pub struct LogSink;

impl UsageSink for LogSink {
    fn record(&self, sample: &UsageSample, _at: DateTime<Utc>) {
        log::info!("Usage: {} for {}ms", sample.package, sample.duration_ms);
    }
}

/// Persists samples to the usage table
///
/// Inserts run inline; a sample is stored before `record` returns.
pub struct DatabaseSink {
    database: Arc<Mutex<Database>>,
}

impl DatabaseSink {
    #[must_use]
    pub fn new(database: Arc<Mutex<Database>>) -> Self {
        Self { database }
    }
}

impl UsageSink for DatabaseSink {
    fn record(&self, sample: &UsageSample, at: DateTime<Utc>) {
        let record = UsageRecord::new(sample.package.clone(), sample.duration_ms, at);
        let db = self.database.lock().unwrap_or_else(|poisoned| {
            log::warn!("DatabaseSink: database mutex was poisoned, recovering");
            poisoned.into_inner()
        });
        if let Err(e) = db.insert_usage_record(&record) {
            log::warn!("Failed to store usage sample for {}: {e:#}", record.package);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_sink_persists_sample() {
        let database = Arc::new(Mutex::new(Database::in_memory().unwrap()));
        let sink = DatabaseSink::new(Arc::clone(&database));

        sink.record(
            &UsageSample {
                package: "com.a".to_string(),
                duration_ms: 4_200,
            },
            Utc::now(),
        );

        let totals = database.lock().unwrap().get_usage_totals(None).unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].package, "com.a");
        assert_eq!(totals[0].total_ms, 4_200);
    }
}
