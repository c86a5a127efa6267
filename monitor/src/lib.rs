//! ShellNotify Monitor - filesystem watcher feeding shell change notifications.
//!
//! This crate connects real directories to a
//! [`ChangeNotifyRegistry`](shellnotify_registry::ChangeNotifyRegistry):
//! filesystem events are translated into shell change events, raised on
//! the registry, and the notifications its clients consume are reported
//! as JSON lines.
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for monitor operations
//! - [`translate`]: Filesystem event to shell event translation
//! - [`watcher`]: Filesystem watcher bridging into the registry
//! - [`output`]: JSON-lines records of consumed notifications

pub mod config;
pub mod error;
pub mod output;
pub mod translate;
pub mod watcher;

pub use config::{Config, ConfigError, WatchSpec};
pub use error::{MonitorError, Result};
pub use output::{event_table, format_event_table, ConsumedRecord, EventRow};
pub use translate::{folder_updates, translate, ShellChange};
pub use watcher::{dispatch_change, resolve_root, watch_item, FsBridge, WatcherError};
