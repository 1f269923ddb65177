//! Application directory paths for the wake host.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! - `REPTITRACK_WAKE_CONFIG_DIR`: overrides [`config_dir`]
//! - `REPTITRACK_WAKE_DATA_DIR`: overrides [`data_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "reptitrack-wake";

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/reptitrack-wake/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("REPTITRACK_WAKE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/reptitrack-wake-config"))
}

/// Application data directory, used for log files.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("REPTITRACK_WAKE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/reptitrack-wake-data"))
}

/// Main config file path (`config_dir()/wake.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("wake.toml")
}

/// Default log directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
