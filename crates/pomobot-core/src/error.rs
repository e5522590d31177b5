//! Core error types for pomobot-core.
//!
//! Each concern gets its own thiserror enum so callers can match on exactly
//! which invariant a request would have violated. [`CoreError`] wraps them
//! for code that only needs to propagate.

use std::path::PathBuf;
use thiserror::Error;

use crate::ids::TimerId;

/// Core error type for pomobot-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Setup string could not be parsed
    #[error("Setup string error: {0}")]
    Parse(#[from] ParseError),

    /// Illegal timer transition
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Ledger bookkeeping violation
    #[error("Subscription error: {0}")]
    Ledger(#[from] LedgerError),

    /// Registry invariant violation
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Setup-string errors. Clause numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("setup string is empty")]
    Empty,

    #[error("stage {clause}: expected `name, duration[, message]`, found {found} field(s)")]
    FieldCount { clause: usize, found: usize },

    #[error("stage {clause}: name must not be empty")]
    EmptyName { clause: usize },

    #[error("stage {clause}: duration `{value}` is not a positive whole number of minutes")]
    InvalidDuration { clause: usize, value: String },

    #[error("stage {clause}: duration of {minutes} minutes is too long")]
    DurationOutOfRange { clause: usize, minutes: u64 },
}

/// Illegal group timer transitions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer is already running")]
    AlreadyRunning,

    #[error("timer is not running")]
    NotRunning,

    #[error("timer has no stages configured")]
    NotConfigured,
}

/// Per-ledger session errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("member already has an active session on this timer")]
    AlreadyJoined,

    #[error("member has no active session on this timer")]
    NotJoined,
}

/// Registry-level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The member is already subscribed to some timer (this one or another).
    #[error("member is already subscribed to timer {timer}")]
    AlreadySubscribed { timer: TimerId },

    #[error("member is not subscribed to any timer")]
    NotSubscribed,

    #[error("a group named `{name}` already exists in this channel")]
    DuplicateName { name: String },

    #[error("group name must not be empty")]
    InvalidName,

    #[error("unknown timer {0}")]
    UnknownTimer(TimerId),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Could not determine where configuration lives
    #[error("Configuration directory unavailable: {0}")]
    NoDataDir(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_name_the_clause() {
        let err = ParseError::InvalidDuration {
            clause: 2,
            value: "abc".into(),
        };
        assert!(err.to_string().contains("stage 2"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn core_error_wraps_component_errors() {
        let err: CoreError = TimerError::NotConfigured.into();
        assert!(matches!(err, CoreError::Timer(TimerError::NotConfigured)));
        assert_eq!(
            err.to_string(),
            "Timer error: timer has no stages configured"
        );
    }
}
