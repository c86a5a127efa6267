//! ShellNotify Registry - shell change-notification registry and dispatcher.
//!
//! Clients register interest in kinds of filesystem and shell changes at
//! particular locations; producers announce changes; the registry decides
//! which clients care and delivers a message to each of them. A notified
//! client then collects the change it was told about.
//!
//! # Overview
//!
//! A change notification is an [`EventMask`] plus up to two items. Events
//! fall into three families: no-item events (association changes),
//! one-item events (create, delete, attributes, ...) and two-item events
//! (renames and updates). Items arrive as textual paths or as pre-resolved
//! [`ItemIdList`]s and are matched against each registration's watch items,
//! either exactly or as a whole subtree.
//!
//! # Modules
//!
//! - [`events`]: Event bits, named sets and family classification
//! - [`idlist`]: Structured path identities
//! - [`matcher`]: Watch relevance test
//! - [`payload`]: Notification item representations
//! - [`store`]: Registration storage and handles
//! - [`delivery`]: Delivery targets and sinks
//! - [`registry`]: The registry, dispatcher and lock/consume protocol
//! - [`shell`]: Win32-shaped entry points
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types

pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod idlist;
pub mod matcher;
pub mod payload;
pub mod registry;
pub mod shell;
pub mod store;

pub use config::{ConfigError, RegistryConfig, TwoItemMatching};
pub use delivery::{ChangeMessage, Deliver, NotifyTarget, QueueSink, RecordingSink, WindowId};
pub use error::{NotifyError, RegistryError};
pub use events::{classify, Classification, EventFamily, EventMask, ParseEventMaskError};
pub use idlist::{ItemId, ItemIdList, ResolveError};
pub use payload::{Item, PayloadKind};
pub use registry::{ChangeNotifyRegistry, LockedNotification, NotifyReport, RegistrationSnapshot};
pub use shell::ShellChangeNotify;
pub use store::{Handle, WatchItem};
