mod config;

pub use config::{Config, LogConfig, SchedulerConfig, TimersConfig};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/pomobot[-dev]/` based on POMOBOT_ENV.
///
/// Set POMOBOT_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("POMOBOT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pomobot-dev")
    } else {
        base_dir.join("pomobot")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::NoDataDir(e.to_string()))?;
    Ok(dir)
}
