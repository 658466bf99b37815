//! Configuration for Desk Sentinel.
//!
//! Two layers: [`Config`] covers paths and producer cadences and lives in a
//! JSON file under the platform config directory. [`MonitorSettings`] covers
//! the alerting thresholds; it is persisted in the SQLite settings table and
//! validated at this boundary so an invalid update never reaches the engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration: storage locations and producer cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the database and other state
    pub data_path: PathBuf,

    /// Pause between processed frames, in milliseconds
    pub frame_interval_ms: u64,

    /// Status refresh tick, in milliseconds
    pub status_refresh_ms: u64,

    /// Break reminder interval, in seconds
    pub break_interval_secs: u64,

    /// Session duration accounting increment, in seconds
    pub session_log_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("desk-sentinel");

        Self {
            data_path: data_dir,
            frame_interval_ms: 200,
            status_refresh_ms: 100,
            break_interval_secs: 3600,
            session_log_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("desk-sentinel")
            .join("config.json")
    }

    /// Path of the SQLite database.
    pub fn db_path(&self) -> PathBuf {
        self.data_path.join("sentinel.db")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alerting thresholds, persisted in the settings table and adjustable at
/// runtime through a validated update path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Smoothed eye-aspect-ratio at or below which eyes count as closed
    pub ear_threshold: f64,
    /// Minimum blinks per minute before the low-blink-rate alert fires
    pub min_blink_threshold: u32,
    /// Seconds of sustained poor posture before the stage-three alert
    pub bad_posture_threshold_secs: i64,
    /// Keystrokes before the keyboard overuse alert fires
    pub keyboard_limit: u32,
    /// Clicks before the mouse overuse alert fires
    pub mouse_limit: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            ear_threshold: 0.45,
            min_blink_threshold: 17,
            bad_posture_threshold_secs: 120,
            keyboard_limit: 2500,
            mouse_limit: 2500,
        }
    }
}

impl MonitorSettings {
    /// Setting names as stored in the settings table.
    pub const NAMES: [&'static str; 5] = [
        "ear_threshold",
        "min_blink_threshold",
        "bad_posture_threshold",
        "keyboard_limit",
        "mouse_limit",
    ];

    /// Check all thresholds are inside their accepted ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.ear_threshold > 0.0 && self.ear_threshold < 1.0) {
            return Err(SettingsError::Invalid {
                name: "ear_threshold",
                reason: format!("{} is outside (0, 1)", self.ear_threshold),
            });
        }
        if !(1..=60).contains(&self.min_blink_threshold) {
            return Err(SettingsError::Invalid {
                name: "min_blink_threshold",
                reason: format!("{} is outside 1..=60", self.min_blink_threshold),
            });
        }
        if !(30..=600).contains(&self.bad_posture_threshold_secs) {
            return Err(SettingsError::Invalid {
                name: "bad_posture_threshold",
                reason: format!("{} is outside 30..=600", self.bad_posture_threshold_secs),
            });
        }
        if !(100..=100_000).contains(&self.keyboard_limit) {
            return Err(SettingsError::Invalid {
                name: "keyboard_limit",
                reason: format!("{} is outside 100..=100000", self.keyboard_limit),
            });
        }
        if !(100..=100_000).contains(&self.mouse_limit) {
            return Err(SettingsError::Invalid {
                name: "mouse_limit",
                reason: format!("{} is outside 100..=100000", self.mouse_limit),
            });
        }
        Ok(())
    }

    /// Apply one named setting from its string form.
    ///
    /// The update is validated first; on failure the previous values are
    /// retained untouched.
    pub fn apply(&mut self, name: &str, value: &str) -> Result<(), SettingsError> {
        let mut candidate = self.clone();
        match name {
            "ear_threshold" => candidate.ear_threshold = parse("ear_threshold", value)?,
            "min_blink_threshold" => {
                candidate.min_blink_threshold = parse("min_blink_threshold", value)?
            }
            "bad_posture_threshold" => {
                candidate.bad_posture_threshold_secs = parse("bad_posture_threshold", value)?
            }
            "keyboard_limit" => candidate.keyboard_limit = parse("keyboard_limit", value)?,
            "mouse_limit" => candidate.mouse_limit = parse("mouse_limit", value)?,
            other => return Err(SettingsError::Unknown(other.to_string())),
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Value of one named setting in its string form.
    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "ear_threshold" => Some(self.ear_threshold.to_string()),
            "min_blink_threshold" => Some(self.min_blink_threshold.to_string()),
            "bad_posture_threshold" => Some(self.bad_posture_threshold_secs.to_string()),
            "keyboard_limit" => Some(self.keyboard_limit.to_string()),
            "mouse_limit" => Some(self.mouse_limit.to_string()),
            _ => None,
        }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| SettingsError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Errors raised at the settings boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    Unknown(String),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
