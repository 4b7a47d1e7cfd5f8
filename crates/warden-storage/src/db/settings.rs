use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::helpers::{parse_string_list, parse_uuid};
use super::Database;
use crate::models::Settings;

impl Database {
    // ==================== Settings Methods ====================

    /// Get settings, creating the default row on first access
    ///
    /// # Errors
    ///
    /// Returns an error if the database query or insert fails
    pub fn get_settings(&self) -> Result<Settings> {
        let result: Option<Settings> = self
            .conn
            .query_row(
                "SELECT id, is_monitoring, blocked_apps FROM settings LIMIT 1",
                [],
                |row| {
                    Ok(Settings {
                        id: parse_uuid(&row.get::<_, String>(0)?)?,
                        is_monitoring: row.get::<_, i32>(1)? != 0,
                        blocked_apps: parse_string_list(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        if let Some(settings) = result {
            Ok(settings)
        } else {
            let settings = Settings::default_settings();
            self.update_settings(&settings)?;
            Ok(settings)
        }
    }

    /// Update settings
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization or the database upsert fails
    pub fn update_settings(&self, settings: &Settings) -> Result<()> {
        let blocked_apps_json = serde_json::to_string(&settings.blocked_apps)?;

        self.conn.execute(
            "INSERT INTO settings (id, is_monitoring, blocked_apps)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                is_monitoring = ?2,
                blocked_apps = ?3",
            params![
                settings.id.to_string(),
                i32::from(settings.is_monitoring),
                blocked_apps_json,
            ],
        )?;
        Ok(())
    }

    /// Replace the blocked package list, returning how many entries were stored
    ///
    /// Duplicates and blank identifiers are dropped; order of first appearance is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing settings fails
    pub fn set_blocked_apps(&self, packages: &[String]) -> Result<usize> {
        let mut settings = self.get_settings()?;
        let mut cleaned: Vec<String> = Vec::with_capacity(packages.len());
        for package in packages {
            let package = package.trim();
            if !package.is_empty() && !cleaned.iter().any(|p| p == package) {
                cleaned.push(package.to_string());
            }
        }
        settings.blocked_apps = cleaned;
        self.update_settings(&settings)?;
        Ok(settings.blocked_apps.len())
    }

    /// Persist the monitoring switch
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing settings fails
    pub fn set_monitoring(&self, enabled: bool) -> Result<()> {
        let mut settings = self.get_settings()?;
        settings.is_monitoring = enabled;
        self.update_settings(&settings)
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn test_default_settings_created_once() {
        let db = Database::in_memory().unwrap();
        let first = db.get_settings().unwrap();
        let second = db.get_settings().unwrap();

        assert_eq!(first.id, second.id);
        assert!(!first.is_monitoring);
        assert!(first.blocked_apps.is_empty());
    }

    #[test]
    fn test_set_blocked_apps_dedupes() {
        let db = Database::in_memory().unwrap();
        let count = db
            .set_blocked_apps(&[
                "com.x".to_string(),
                " com.y ".to_string(),
                "com.x".to_string(),
                String::new(),
            ])
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(db.get_settings().unwrap().blocked_apps, vec!["com.x", "com.y"]);
    }

    #[test]
    fn test_set_monitoring_persists() {
        let db = Database::in_memory().unwrap();
        db.set_blocked_apps(&["com.x".to_string()]).unwrap();
        db.set_monitoring(true).unwrap();

        let settings = db.get_settings().unwrap();
        assert!(settings.is_monitoring);
        assert_eq!(settings.blocked_apps, vec!["com.x"]);
    }
}
