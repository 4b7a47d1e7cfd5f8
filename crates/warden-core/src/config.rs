use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SELF_APP_ID: &str = "com.warden.app";
pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 50;
pub const DEFAULT_COOLDOWN_MS: u64 = 2000;
pub const DEFAULT_USAGE_MIN_DURATION_MS: u64 = 1000;

const DEFAULT_LAUNCHERS: &[&str] = &[
    "com.android.launcher3",
    "com.google.android.apps.nexuslauncher",
    "com.sec.android.app.launcher",
    "com.miui.home",
];

const DEFAULT_TRANSIENT: &[&str] = &[
    "com.android.systemui",
    "android",
    "com.google.android.permissioncontroller",
];

/// Get the local data directory for warden.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("warden");
    Ok(path)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables and static package sets, read from `config.toml`
///
/// The block list is not here: it lives in the settings store and changes at
/// runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// The host app's own package; switching to it always resets blocking state
    pub self_app_id: String,
    /// Home-screen launchers; switching to one always resets blocking state
    pub launcher_packages: Vec<String>,
    /// System windows that flash transiently and must not cancel a pending block
    pub transient_packages: Vec<String>,
    pub debounce_delay_ms: u64,
    pub cooldown_ms: u64,
    pub usage_min_duration_ms: u64,
    /// Allow `notification_only` events from a blocked package to start the
    /// debounce timer. Off by default: only real window changes block.
    pub notifications_start_block: bool,
    /// Program (and leading args) launched with the package id to show the overlay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_command: Option<Vec<String>>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            self_app_id: DEFAULT_SELF_APP_ID.to_string(),
            launcher_packages: DEFAULT_LAUNCHERS.iter().map(ToString::to_string).collect(),
            transient_packages: DEFAULT_TRANSIENT.iter().map(ToString::to_string).collect(),
            debounce_delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            usage_min_duration_ms: DEFAULT_USAGE_MIN_DURATION_MS,
            notifications_start_block: false,
            overlay_command: None,
        }
    }
}

impl WardenConfig {
    /// Default location of the config file
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined
    pub fn default_path() -> Result<PathBuf> {
        Ok(get_data_dir()?.join("config.toml"))
    }

    /// Load from `path`; a missing file yields the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or validated
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as TOML, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be encoded
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.self_app_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "self_app_id",
                reason: "must not be empty".to_string(),
            });
        }
        if i64::try_from(self.cooldown_ms).is_err() {
            return Err(ConfigError::Invalid {
                field: "cooldown_ms",
                reason: format!("{} is out of range", self.cooldown_ms),
            });
        }
        if i64::try_from(self.usage_min_duration_ms).is_err() {
            return Err(ConfigError::Invalid {
                field: "usage_min_duration_ms",
                reason: format!("{} is out of range", self.usage_min_duration_ms),
            });
        }
        if matches!(&self.overlay_command, Some(argv) if argv.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "overlay_command",
                reason: "must name a program".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn debounce_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_delay_ms)
    }

    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.cooldown_ms).unwrap_or(i64::MAX))
    }
}
