//! Helper utility functions for CLI commands
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::path::{Path, PathBuf};
use warden_core::{
    config::WardenConfig,
    ipc::{IpcClient, IpcRequest, IpcResponse},
};
use warden_storage::Database;

pub const PID_FILE: &str = "warden.pid";
pub const SOCKET_FILE: &str = "warden.sock";

pub fn socket_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SOCKET_FILE)
}

pub fn open_database(data_dir: &Path) -> Result<Database> {
    Database::new(Some(Database::path_in(data_dir)))
}

/// Load and validate the config file
pub fn load_config() -> Result<WardenConfig> {
    let path = WardenConfig::default_path()?;
    Ok(WardenConfig::load(&path)?)
}

/// Forward a change to a running daemon; stored settings apply on its next start otherwise
pub async fn notify_daemon(data_dir: &Path, request: IpcRequest) -> Option<IpcResponse> {
    let sock_path = socket_path(data_dir);
    if !sock_path.exists() {
        return None;
    }

    match IpcClient::new(&sock_path).send_command(request).await {
        Ok(response) => Some(response),
        Err(e) => {
            log::warn!("Daemon not reachable ({e}), change applies on next start");
            None
        }
    }
}

/// Start of a reporting period, `None` meaning all time
pub fn period_start(period: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    match period {
        "today" => Ok(Some(now.date_naive().and_time(NaiveTime::MIN).and_utc())),
        "week" => Ok(Some(now - Duration::days(7))),
        "month" => Ok(Some(now - Duration::days(30))),
        "all" => Ok(None),
        _ => anyhow::bail!("Unknown period: {period}. Use 'today', 'week', 'month', or 'all'"),
    }
}

/// Render milliseconds as `1h 02m 03s`, `4m 05s` or `6s`
pub fn format_duration_ms(ms: i64) -> String {
    let total = ms.max(0) / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Safely truncate a string to a maximum number of characters (not bytes).
/// This avoids panics when slicing multi-byte UTF-8 characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_str_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_str_long() {
        assert_eq!(truncate_str("com.example.app", 7), "com.exa...");
    }

    #[test]
    fn test_truncate_str_unicode() {
        assert_eq!(truncate_str("\u{4f60}\u{597d}\u{4e16}\u{754c}", 2), "\u{4f60}\u{597d}...");
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(999), "0s");
        assert_eq!(format_duration_ms(6_500), "6s");
        assert_eq!(format_duration_ms(245_000), "4m 05s");
        assert_eq!(format_duration_ms(3_723_000), "1h 02m 03s");
        assert_eq!(format_duration_ms(-5), "0s");
    }

    #[test]
    fn test_period_start() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();

        assert_eq!(
            period_start("today", now).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(
            period_start("week", now).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 3, 15, 30, 0).unwrap())
        );
        assert_eq!(period_start("all", now).unwrap(), None);
        assert!(period_start("fortnight", now).is_err());
    }

    #[tokio::test]
    async fn test_notify_without_daemon_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(notify_daemon(dir.path(), IpcRequest::Status).await.is_none());
    }

    #[test]
    fn test_open_database_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_database(dir.path()).unwrap();

        assert!(db.get_settings().unwrap().blocked_apps.is_empty());
        assert!(dir.path().join("warden.db").exists());
    }
}
