use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of OS transition produced a foreground event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A window of `package` became the foreground window
    WindowChanged,
    /// `package` posted or updated a notification; the foreground did not change
    NotificationOnly,
}

/// A single foreground-change notification from the event source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundChangeEvent {
    #[serde(default)]
    pub package: Option<String>,
    pub kind: EventKind,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ForegroundChangeEvent {
    #[must_use]
    pub fn window_changed(package: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            package: Some(package.into()),
            kind: EventKind::WindowChanged,
            timestamp,
        }
    }

    #[must_use]
    pub fn notification(package: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            package: Some(package.into()),
            kind: EventKind::NotificationOnly,
            timestamp,
        }
    }

    /// The package identifier, or `None` when absent or blank
    #[must_use]
    pub fn package_id(&self) -> Option<&str> {
        self.package
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    #[must_use]
    pub fn is_window_change(&self) -> bool {
        self.kind == EventKind::WindowChanged
    }
}

/// One line of the event feed
///
/// Presenters that share the feed with the OS bridge report dismissals inline,
/// so both travel in the same ordered stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedRecord {
    Foreground(ForegroundChangeEvent),
    OverlayDismissed {
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed feed line: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl FeedRecord {
    /// Parse one JSON line. Blank lines and `#` comments yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Malformed` if the line is not a valid record
    pub fn parse_line(line: &str) -> Result<Option<Self>, FeedError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line)?))
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Foreground(event) => event.timestamp,
            Self::OverlayDismissed { timestamp } => *timestamp,
        }
    }
}

impl From<ForegroundChangeEvent> for FeedRecord {
    fn from(event: ForegroundChangeEvent) -> Self {
        Self::Foreground(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_foreground_line() {
        let record = FeedRecord::parse_line(
            r#"{"type":"foreground","package":"com.x","kind":"window_changed","timestamp":"2024-01-01T10:00:00Z"}"#,
        )
        .unwrap()
        .unwrap();

        let expected = ForegroundChangeEvent::window_changed(
            "com.x",
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
        );
        assert_eq!(record, FeedRecord::Foreground(expected));
    }

    #[test]
    fn test_parse_dismissal_line() {
        let record = FeedRecord::parse_line(
            r#"{"type":"overlay_dismissed","timestamp":"2024-01-01T10:00:01Z"}"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            record.timestamp(),
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 1).unwrap()
        );
    }

    #[test]
    fn test_missing_package_and_timestamp_are_tolerated() {
        let record = FeedRecord::parse_line(r#"{"type":"foreground","kind":"notification_only"}"#)
            .unwrap()
            .unwrap();

        match record {
            FeedRecord::Foreground(event) => {
                assert!(event.package_id().is_none());
                assert!(!event.is_window_change());
            }
            FeedRecord::OverlayDismissed { .. } => panic!("expected foreground record"),
        }
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        assert!(FeedRecord::parse_line("   ").unwrap().is_none());
        assert!(FeedRecord::parse_line("# recorded on pixel 7").unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_is_error() {
        let err = FeedRecord::parse_line("{not json").unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
    }

    #[test]
    fn test_blank_package_is_none() {
        let mut event = ForegroundChangeEvent::window_changed("  ", Utc::now());
        assert!(event.package_id().is_none());
        event.package = None;
        assert!(event.package_id().is_none());
    }
}
