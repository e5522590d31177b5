//! TOML-based application configuration.
//!
//! Stores:
//! - Scheduler polling interval
//! - The setup string used when a group is set up without one
//! - Default log filter
//!
//! Configuration is stored at `~/.config/pomobot/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{StageList, DEFAULT_SETUP};

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often every running timer is checked, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Timer defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersConfig {
    /// Setup string substituted when `set` is used without one.
    #[serde(default = "default_setup")]
    pub default_setup: String,
}

/// Logging configuration. `RUST_LOG` takes precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomobot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub log: LogConfig,
}

// Default functions
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_setup() -> String {
    DEFAULT_SETUP.to_string()
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            default_setup: default_setup(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(unknown());
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined or created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.poll_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        StageList::parse(&self.timers.default_setup).map_err(|e| ConfigError::InvalidValue {
            key: "timers.default_setup".into(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.poll_interval_ms.max(1))
    }

    /// The configured default stage list, falling back to the built-in one.
    pub fn default_stages(&self) -> StageList {
        StageList::parse(&self.timers.default_setup).unwrap_or_else(|_| StageList::default_cycle())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.scheduler.poll_interval_ms, 1000);
        assert_eq!(parsed.timers.default_setup, DEFAULT_SETUP);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[scheduler]\npoll_interval_ms = 250\n").unwrap();
        assert_eq!(parsed.poll_interval(), Duration::from_millis(250));
        assert_eq!(parsed.log.filter, "info");
        assert_eq!(parsed.default_stages().len(), 6);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("scheduler.poll_interval_ms").as_deref(), Some("1000"));
        assert_eq!(cfg.get("log.filter").as_deref(), Some("info"));
        assert!(cfg.get("scheduler").is_none());
        assert!(cfg.get("scheduler.missing_key").is_none());
    }

    #[test]
    fn set_updates_number_and_string() {
        let mut cfg = Config::default();
        cfg.set("scheduler.poll_interval_ms", "500").unwrap();
        cfg.set("timers.default_setup", "Focus, 50; Rest, 10").unwrap();
        assert_eq!(cfg.scheduler.poll_interval_ms, 500);
        assert_eq!(cfg.default_stages().len(), 2);
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("scheduler.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("scheduler.poll_interval_ms", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("scheduler.poll_interval_ms", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("timers.default_setup", "Study"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.scheduler.poll_interval_ms, 1000);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.scheduler.poll_interval_ms, 1000);
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.set("log.filter", "pomobot_core=debug").unwrap();
        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.log.filter, "pomobot_core=debug");
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\npoll_interval_ms = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
