use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ForegroundChangeEvent;

/// Foreground dwell time of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSample {
    pub package: String,
    pub duration_ms: i64,
}

/// Turns the foreground event stream into dwell-time samples
///
/// Only window changes to a different package close a dwell interval.
/// Intervals at or under the minimum duration are discarded as flicker.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    current_package: String,
    since: Option<DateTime<Utc>>,
    min_duration_ms: i64,
}

impl UsageTracker {
    #[must_use]
    pub fn new(min_duration_ms: u64) -> Self {
        Self {
            current_package: String::new(),
            since: None,
            min_duration_ms: i64::try_from(min_duration_ms).unwrap_or(i64::MAX),
        }
    }

    /// Feed one event; returns the sample for the package it replaced, if any
    pub fn on_event(&mut self, event: &ForegroundChangeEvent) -> Option<UsageSample> {
        if !event.is_window_change() {
            return None;
        }
        let package = event.package_id()?;
        if package == self.current_package {
            return None;
        }

        let sample = self.sample_until(event.timestamp);
        self.current_package = package.to_string();
        self.since = Some(event.timestamp);
        sample
    }

    /// Close the in-progress interval at `now`, e.g. on shutdown
    pub fn flush(&mut self, now: DateTime<Utc>) -> Option<UsageSample> {
        let sample = self.sample_until(now);
        self.current_package.clear();
        self.since = None;
        sample
    }

    #[must_use]
    pub fn current_package(&self) -> Option<&str> {
        (!self.current_package.is_empty()).then_some(self.current_package.as_str())
    }

    fn sample_until(&self, now: DateTime<Utc>) -> Option<UsageSample> {
        let since = self.since?;
        if self.current_package.is_empty() {
            return None;
        }

        let duration_ms = now.signed_duration_since(since).num_milliseconds();
        (duration_ms > self.min_duration_ms).then(|| UsageSample {
            package: self.current_package.clone(),
            duration_ms,
        })
    }
}
