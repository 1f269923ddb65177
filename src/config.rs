//! Configuration for the wake scheduling core.

use crate::error::{Result, WakeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest re-check interval the OS schedulers will honour (5 minutes).
pub const MIN_INTERVAL_SECS: u64 = 300;

/// Fixed re-check interval (15 minutes) and the upper bound of the jitter band.
pub const MAX_INTERVAL_SECS: u64 = 900;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Wake source identity and re-arm interval.
    pub schedule: ScheduleConfig,
    /// Bounded waits around the Check Operation.
    pub check: CheckConfig,
    /// Exact-scheduling permission behaviour.
    pub permissions: PermissionConfig,
    /// Bridge channel capacities.
    pub bridge: BridgeConfig,
    /// Log level and optional log directory.
    pub logging: LoggingConfig,
    /// Simulated OS settings for the headless host binary.
    pub host: HostConfig,
}

/// Wake source scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Opaque identifier of the single wake source.
    pub source_id: String,
    /// Seconds between the end of one wake and the earliest next one.
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            source_id: "com.example.reptitrack_app.NOTIFICATION_CHECK".to_owned(),
            interval_secs: MAX_INTERVAL_SECS,
        }
    }
}

impl ScheduleConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Check Operation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Upper bound for a check on the alarm path, which has no OS budget.
    ///
    /// Kept to single-digit seconds so one slow check never starves the
    /// next scheduling cycle.
    pub alarm_timeout_secs: u64,
    /// Bounded wait for any native→app call before it is treated as `false`.
    pub call_timeout_secs: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            alarm_timeout_secs: 8,
            call_timeout_secs: 25,
        }
    }
}

impl CheckConfig {
    #[must_use]
    pub fn alarm_timeout(&self) -> Duration {
        Duration::from_secs(self.alarm_timeout_secs)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Exact-alarm permission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Open the OS settings flow when an exact schedule is refused.
    pub elevate_on_denial: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            elevate_on_denial: true,
        }
    }
}

/// Bridge channel capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Queue depth for app→native method calls.
    pub request_capacity: usize,
    /// Queue depth for native→app method calls.
    pub app_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_capacity: 64,
            app_capacity: 16,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Directory for daily log files (None = stderr only).
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// Configured log directory, or the application logs directory when unset.
    #[must_use]
    pub fn log_dir_or_default(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(crate::wake_dirs::logs_dir)
    }
}

/// Simulated OS settings used by `wake-host`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// How often the simulated OS looks for due wake requests.
    pub poll_interval_secs: u64,
    /// Execution budget granted to a budgeted background refresh.
    pub refresh_budget_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            refresh_budget_secs: 30,
        }
    }
}

impl WakeConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| WakeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| WakeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path` when it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only when an existing file is unreadable or invalid.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::wake_dirs::config_file()
    }

    /// Check the values the OS schedulers cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`WakeError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.source_id.trim().is_empty() {
            return Err(WakeError::Config(
                "schedule.source_id cannot be empty".to_owned(),
            ));
        }
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&self.schedule.interval_secs) {
            return Err(WakeError::Config(format!(
                "schedule.interval_secs must be within {MIN_INTERVAL_SECS}..={MAX_INTERVAL_SECS}, got {}",
                self.schedule.interval_secs
            )));
        }
        if !(1..=9).contains(&self.check.alarm_timeout_secs) {
            return Err(WakeError::Config(format!(
                "check.alarm_timeout_secs must be within 1..=9, got {}",
                self.check.alarm_timeout_secs
            )));
        }
        if self.check.call_timeout_secs == 0 {
            return Err(WakeError::Config(
                "check.call_timeout_secs must be positive".to_owned(),
            ));
        }
        if self.host.poll_interval_secs == 0 || self.host.refresh_budget_secs == 0 {
            return Err(WakeError::Config(
                "host intervals must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}
