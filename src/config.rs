use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{ReminderError, Result};
use crate::utils::{default_config_path, default_database_path, parse_time};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// SQLite file; `None` means `<data_dir>/PaymentReminders/reminders.db`.
    pub database_path: Option<PathBuf>,
    /// Time of day used when a reminder has no `reminder_time`, as `HH:MM`.
    pub default_reminder_time: String,
    pub snooze_minutes: i64,
    pub sync_batch_size: usize,
    pub sync_batch_delay_ms: u64,
    pub background_interval_secs: u64,
    pub cleanup_interval_hours: i64,
    pub stale_notification_days: i64,
    pub deep_link_scheme: String,
    pub currency_symbol: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            default_reminder_time: "09:00".to_string(),
            snooze_minutes: 60,
            sync_batch_size: 5,
            sync_batch_delay_ms: 100,
            background_interval_secs: 15 * 60,
            cleanup_interval_hours: 24,
            stale_notification_days: 30,
            deep_link_scheme: "paymentreminders".to_string(),
            currency_symbol: "$".to_string(),
        }
    }
}

impl ReminderConfig {
    /// Reads a JSON config file. A missing or broken file yields the defaults.
    pub fn load(path: &Path) -> Self {
        let config_data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("no reminder config at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str::<ReminderConfig>(&config_data) {
            Ok(config) => match config.validate() {
                Ok(()) => config,
                Err(e) => {
                    log::warn!("ignoring invalid reminder config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("failed to parse reminder config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_or_default() -> Self {
        match default_config_path() {
            Ok(path) => Self::load(&path),
            Err(e) => {
                log::warn!("using default reminder config: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, config_json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        parse_time(&self.default_reminder_time).map_err(|e| ReminderError::Config(e.to_string()))?;
        if self.sync_batch_size == 0 {
            return Err(ReminderError::Config("sync_batch_size must be at least 1".to_string()));
        }
        if self.snooze_minutes <= 0 {
            return Err(ReminderError::Config("snooze_minutes must be positive".to_string()));
        }
        if self.background_interval_secs == 0 {
            return Err(ReminderError::Config(
                "background_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_time(&self) -> NaiveTime {
        parse_time(&self.default_reminder_time)
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }

    pub fn deep_link(&self, reminder_id: &str) -> String {
        format!("{}://reminders/{}", self.deep_link_scheme, reminder_id)
    }
}
