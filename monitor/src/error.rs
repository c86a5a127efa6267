//! Error types for the ShellNotify Monitor.
//!
//! This module defines the error types used throughout the monitor crate,
//! providing structured error handling with clear, human-readable messages.

use shellnotify_registry::RegistryError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::watcher::WatcherError;

/// Errors that can occur during monitor operations.
///
/// This is the primary error type for the monitor crate, encompassing all
/// possible failure modes.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// Registration with the change-notification registry failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn config_error_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "SHELLNOTIFY_BUFFER_SIZE".to_string(),
            message: "expected positive integer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for SHELLNOTIFY_BUFFER_SIZE: expected positive integer"
        );
    }

    #[test]
    fn config_error_no_home_directory_display() {
        let err = ConfigError::NoHomeDirectory;
        assert_eq!(err.to_string(), "failed to determine home directory");
    }

    #[test]
    fn monitor_error_config_display() {
        let err = MonitorError::Config(ConfigError::NoHomeDirectory);
        assert_eq!(
            err.to_string(),
            "configuration error: failed to determine home directory"
        );
    }

    #[test]
    fn monitor_error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MonitorError = io_err.into();
        assert!(matches!(err, MonitorError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn monitor_error_json_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: MonitorError = json_err.into();
        assert!(matches!(err, MonitorError::Json(_)));
    }

    #[test]
    fn monitor_error_watch_display() {
        let err: MonitorError = WatcherError::DirectoryNotFound(PathBuf::from("/missing")).into();
        assert_eq!(
            err.to_string(),
            "file watch error: watch directory does not exist: /missing"
        );
    }

    #[test]
    fn monitor_error_registry_display() {
        let err: MonitorError = RegistryError::OutOfMemory.into();
        assert_eq!(err.to_string(), "registry error: out of memory");
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let monitor_err: MonitorError = io_err.into();

        assert!(monitor_err.source().is_some());
    }
}
