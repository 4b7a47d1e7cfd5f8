use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted user preferences for the blocker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub id: Uuid,
    /// Whether foreground events are acted on at all
    pub is_monitoring: bool,
    /// Package identifiers the user asked to block
    pub blocked_apps: Vec<String>,
}

/// A single foreground dwell sample reported by the usage tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub package: String,
    pub duration_ms: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregated usage for one package over a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotal {
    pub package: String,
    pub total_ms: i64,
    pub sample_count: u32,
}

impl Settings {
    /// Monitoring off, nothing blocked
    #[must_use]
    pub fn default_settings() -> Self {
        Self {
            id: Uuid::new_v4(),
            is_monitoring: false,
            blocked_apps: Vec::new(),
        }
    }
}

impl UsageRecord {
    #[must_use]
    pub fn new(package: String, duration_ms: i64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            package,
            duration_ms,
            recorded_at,
        }
    }
}
