//! Configuration module for ShellNotify Monitor.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `SHELLNOTIFY_WATCH_DIR` | No | home directory | Root directory to watch when no `--watch` is given |
//! | `SHELLNOTIFY_EVENT_MASK` | No | `0x7FFFFFFF` | Event mask for registered clients (hex, decimal or `CREATE\|DELETE`) |
//! | `SHELLNOTIFY_SUBTREE` | No | `true` | Whether the default watch covers the whole subtree |
//! | `SHELLNOTIFY_BUFFER_SIZE` | No | 1000 | Capacity of the watcher-to-registry channel |
//! | `SHELLNOTIFY_TWO_ITEM_MATCHING` | No | `first` | `first` or `either`; see the registry configuration |
//! | `SHELLNOTIFY_ORIGIN_PID` | No | current process id | Origin identity passed with every delivery |
//!
//! # Example
//!
//! ```no_run
//! use shellnotify_monitor::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Watching: {}", config.watch_dir.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use directories::BaseDirs;
use shellnotify_registry::{EventMask, RegistryConfig};
use thiserror::Error;

/// Default watcher channel capacity.
const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,

    /// The registry's own settings are invalid.
    #[error(transparent)]
    Registry(#[from] shellnotify_registry::ConfigError),
}

/// A directory to watch and whether its descendants are included.
///
/// Parsed from `PATH` or `PATH:flat`; a `:subtree` suffix is also accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub path: PathBuf,
    pub subtree: bool,
}

impl WatchSpec {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, subtree: bool) -> Self {
        Self {
            path: path.into(),
            subtree,
        }
    }
}

impl FromStr for WatchSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, subtree) = match s.rsplit_once(':') {
            Some((path, "flat")) => (path, false),
            Some((path, "subtree")) => (path, true),
            _ => (s, true),
        };

        if path.is_empty() {
            return Err(format!("missing path in watch spec '{s}'"));
        }
        Ok(Self::new(path, subtree))
    }
}

/// Configuration for the ShellNotify Monitor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory watched when no explicit watch is given.
    pub watch_dir: PathBuf,

    /// Events the registered clients are interested in.
    pub event_mask: EventMask,

    /// Whether the default watch includes descendants.
    pub watch_subtree: bool,

    /// Capacity of the channel between the filesystem watcher and the
    /// registry.
    pub buffer_size: usize,

    /// Settings for the change-notification registry.
    pub registry: RegistryConfig,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - A variable is set but cannot be parsed
    /// - `SHELLNOTIFY_BUFFER_SIZE` is zero
    /// - `SHELLNOTIFY_WATCH_DIR` is unset and the home directory cannot be
    ///   determined
    pub fn from_env() -> Result<Self, ConfigError> {
        // Optional: SHELLNOTIFY_WATCH_DIR (default: home directory)
        let watch_dir = match env::var("SHELLNOTIFY_WATCH_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => BaseDirs::new()
                .ok_or(ConfigError::NoHomeDirectory)?
                .home_dir()
                .to_path_buf(),
        };

        // Optional: SHELLNOTIFY_EVENT_MASK (default: ALLEVENTS)
        let event_mask = match env::var("SHELLNOTIFY_EVENT_MASK") {
            Ok(val) => val.parse().map_err(|e: shellnotify_registry::ParseEventMaskError| {
                ConfigError::InvalidValue {
                    key: "SHELLNOTIFY_EVENT_MASK".to_string(),
                    message: e.to_string(),
                }
            })?,
            Err(_) => EventMask::ALLEVENTS,
        };

        // Optional: SHELLNOTIFY_SUBTREE (default: true)
        let watch_subtree = match env::var("SHELLNOTIFY_SUBTREE") {
            Ok(val) => parse_bool(&val).ok_or_else(|| ConfigError::InvalidValue {
                key: "SHELLNOTIFY_SUBTREE".to_string(),
                message: format!("expected true or false, got '{val}'"),
            })?,
            Err(_) => true,
        };

        // Optional: SHELLNOTIFY_BUFFER_SIZE (default: 1000, must be > 0)
        let buffer_size = match env::var("SHELLNOTIFY_BUFFER_SIZE") {
            Ok(val) => {
                let size = val
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "SHELLNOTIFY_BUFFER_SIZE".to_string(),
                        message: format!("expected positive integer, got '{val}'"),
                    })?;
                if size == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "SHELLNOTIFY_BUFFER_SIZE".to_string(),
                        message: "buffer size must be greater than 0".to_string(),
                    });
                }
                size
            }
            Err(_) => DEFAULT_BUFFER_SIZE,
        };

        let registry = RegistryConfig::from_env()?;

        Ok(Self {
            watch_dir,
            event_mask,
            watch_subtree,
            buffer_size,
            registry,
        })
    }

    /// The watch used when none is given on the command line.
    #[must_use]
    pub fn default_watch(&self) -> WatchSpec {
        WatchSpec::new(self.watch_dir.clone(), self.watch_subtree)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
