//! Registry configuration.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `SHELLNOTIFY_TWO_ITEM_MATCHING` | No | `first` | `first` matches two-item events on their first item only; `either` also tries the second |
//! | `SHELLNOTIFY_ORIGIN_PID` | No | current process id | Origin identity passed with every delivery |

use std::env;

use thiserror::Error;
use tracing::warn;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Which items of a two-item event (rename, update) are path matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TwoItemMatching {
    /// Only the first item, as the reference shell does.
    #[default]
    FirstItemOnly,
    /// The first item, then the second.
    EitherItem,
}

impl std::str::FromStr for TwoItemMatching {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::FirstItemOnly),
            "either" => Ok(Self::EitherItem),
            other => Err(format!("expected 'first' or 'either', got '{other}'")),
        }
    }
}

/// Settings for a [`ChangeNotifyRegistry`](crate::registry::ChangeNotifyRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Matching rule for two-item events.
    pub two_item_matching: TwoItemMatching,

    /// Origin identity passed with each delivery.
    pub origin_process: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            two_item_matching: TwoItemMatching::default(),
            origin_process: std::process::id(),
        }
    }
}

impl RegistryConfig {
    /// Sets the two-item matching rule (builder pattern).
    #[must_use]
    pub fn with_two_item_matching(mut self, matching: TwoItemMatching) -> Self {
        self.two_item_matching = matching;
        self
    }

    /// Sets the origin identity (builder pattern).
    #[must_use]
    pub fn with_origin_process(mut self, pid: u32) -> Self {
        self.origin_process = pid;
        self
    }

    /// Parses configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("SHELLNOTIFY_TWO_ITEM_MATCHING") {
            config.two_item_matching =
                value
                    .parse()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: "SHELLNOTIFY_TWO_ITEM_MATCHING".to_string(),
                        message,
                    })?;
        }

        if let Ok(value) = env::var("SHELLNOTIFY_ORIGIN_PID") {
            config.origin_process =
                value
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: "SHELLNOTIFY_ORIGIN_PID".to_string(),
                        message: e.to_string(),
                    })?;
        }

        if config.two_item_matching == TwoItemMatching::EitherItem {
            warn!("Two-item events will match on either item; this differs from the reference shell");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing.
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old_value = env::var(key).ok();
            self.vars.push((key.to_string(), old_value));
            env::set_var(key, value);
        }

        fn remove(&mut self, key: &str) {
            let old_value = env::var(key).ok();
            self.vars.push((key.to_string(), old_value));
            env::remove_var(key);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                match value {
                    Some(v) => env::set_var(&key, v),
                    None => env::remove_var(&key),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_when_unset() {
        let mut guard = EnvGuard::new();
        guard.remove("SHELLNOTIFY_TWO_ITEM_MATCHING");
        guard.remove("SHELLNOTIFY_ORIGIN_PID");

        let config = RegistryConfig::from_env().unwrap();
        assert_eq!(config.two_item_matching, TwoItemMatching::FirstItemOnly);
        assert_eq!(config.origin_process, std::process::id());
    }

    #[test]
    #[serial]
    fn parses_either_matching_case_insensitively() {
        let mut guard = EnvGuard::new();
        guard.set("SHELLNOTIFY_TWO_ITEM_MATCHING", " Either ");
        guard.remove("SHELLNOTIFY_ORIGIN_PID");

        let config = RegistryConfig::from_env().unwrap();
        assert_eq!(config.two_item_matching, TwoItemMatching::EitherItem);
    }

    #[test]
    #[serial]
    fn rejects_unknown_matching() {
        let mut guard = EnvGuard::new();
        guard.set("SHELLNOTIFY_TWO_ITEM_MATCHING", "second");

        let err = RegistryConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "SHELLNOTIFY_TWO_ITEM_MATCHING"
        ));
    }

    #[test]
    #[serial]
    fn parses_origin_pid() {
        let mut guard = EnvGuard::new();
        guard.remove("SHELLNOTIFY_TWO_ITEM_MATCHING");
        guard.set("SHELLNOTIFY_ORIGIN_PID", "4242");

        let config = RegistryConfig::from_env().unwrap();
        assert_eq!(config.origin_process, 4242);
    }

    #[test]
    #[serial]
    fn rejects_non_numeric_origin_pid() {
        let mut guard = EnvGuard::new();
        guard.remove("SHELLNOTIFY_TWO_ITEM_MATCHING");
        guard.set("SHELLNOTIFY_ORIGIN_PID", "abc");

        let err = RegistryConfig::from_env().unwrap_err();
        assert!(err.to_string().starts_with("invalid value for SHELLNOTIFY_ORIGIN_PID"));
    }

    #[test]
    fn builders_override_defaults() {
        let config = RegistryConfig::default()
            .with_two_item_matching(TwoItemMatching::EitherItem)
            .with_origin_process(7);
        assert_eq!(config.two_item_matching, TwoItemMatching::EitherItem);
        assert_eq!(config.origin_process, 7);
    }
}
