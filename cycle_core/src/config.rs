//! Configuration file support for the cycle tracker.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/cycle/config.toml`. Every
//! section is optional; missing keys take their defaults.

use crate::prediction::ForecastSettings;
use crate::reminders::DEFAULT_LEAD_DAYS;
use crate::{Error, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub forecast: ForecastSettings,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub reminders: ReminderConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Calendar rendering configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Day the week starts on ("sunday", "monday", "mon", ...)
    #[serde(default = "default_first_weekday")]
    pub first_weekday: Weekday,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            first_weekday: default_first_weekday(),
        }
    }
}

/// Reminder configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Days before the predicted start at which to remind
    #[serde(default = "default_lead_days")]
    pub lead_days: Vec<u32>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lead_days: default_lead_days(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("cycle")
}

fn default_first_weekday() -> Weekday {
    Weekday::Sun
}

fn default_lead_days() -> Vec<u32> {
    DEFAULT_LEAD_DAYS.to_vec()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("cycle").join("config.toml")
    }

    /// Check values that serde can't
    pub fn validate(&self) -> Result<()> {
        if self.forecast.period_duration == 0 {
            return Err(Error::Config("forecast.period_duration must be at least 1".into()));
        }
        if self.forecast.pms_duration == 0 {
            return Err(Error::Config("forecast.pms_duration must be at least 1".into()));
        }
        Ok(())
    }

    /// Path of the period history inside the data directory
    pub fn history_path(&self) -> PathBuf {
        self.data.data_dir.join(crate::store::HISTORY_FILE)
    }

    /// Path of the pending reminder file inside the data directory
    pub fn reminders_path(&self) -> PathBuf {
        self.data.data_dir.join("reminders.json")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
