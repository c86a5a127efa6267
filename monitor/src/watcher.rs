//! Bridge from the filesystem to the change-notification registry.
//!
//! # Architecture
//!
//! [`FsBridge`] owns a [`notify`] watcher over one or more directories. The
//! notify callback is kept lightweight: it only translates raw events into
//! [`ShellChange`]s and hands them to a bounded channel with `try_send`, so
//! the watcher thread never blocks. A dedicated async task drains the
//! channel and raises each change on the registry as a narrow-path
//! notification.
//!
//! Roots are canonicalized once by [`resolve_root`]. The same path is
//! handed to the OS watcher and to [`watch_item`], so event paths compare
//! equal to registered watch items even when a root is reached through a
//! symlink.
//!
//! A flat root is watched non-recursively. Changes to its direct children
//! are also raised as `UPDATEDIR` on the root (see
//! [`folder_updates`](crate::translate::folder_updates)).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shellnotify_monitor::config::WatchSpec;
//! use shellnotify_monitor::watcher::FsBridge;
//! use shellnotify_registry::ChangeNotifyRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(ChangeNotifyRegistry::default());
//!     let bridge = FsBridge::new(registry, &[WatchSpec::new("/tmp", true)], 1000)?;
//!     println!("watching {} roots", bridge.roots().len());
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use shellnotify_registry::{
    ChangeNotifyRegistry, Item, ItemIdList, NotifyError, NotifyReport, PayloadKind,
    ResolveError, WatchItem,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::WatchSpec;
use crate::translate::{folder_updates, translate, ShellChange};

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// Failed to inspect a watched directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The watch directory does not exist or is inaccessible.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    /// The watch directory has no path identity.
    #[error("cannot resolve watch directory {path}: {source}")]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: ResolveError,
    },
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Filesystem watcher that feeds a [`ChangeNotifyRegistry`].
///
/// Dropping the bridge stops watching and ends the dispatch task.
#[derive(Debug)]
pub struct FsBridge {
    /// Kept alive to maintain the watch subscriptions.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,

    roots: Vec<WatchSpec>,

    dispatcher: JoinHandle<()>,
}

impl FsBridge {
    /// Starts watching `watches` and dispatching their changes.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory does not exist or the watcher cannot
    /// be initialized.
    pub fn new(
        registry: Arc<ChangeNotifyRegistry>,
        watches: &[WatchSpec],
        buffer_size: usize,
    ) -> Result<Self> {
        let roots = watches
            .iter()
            .map(resolve_root)
            .collect::<Result<Vec<_>>>()?;
        let flat_roots = roots
            .iter()
            .filter(|root| !root.subtree)
            .map(|root| root.path.clone())
            .collect();

        let (tx, rx) = mpsc::channel::<ShellChange>(buffer_size);
        let dispatcher = spawn_dispatcher(registry, flat_roots, rx);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                forward_event(res, &tx);
            },
            Config::default(),
        )?;

        for spec in &roots {
            let mode = if spec.subtree {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(&spec.path, mode)?;
            debug!(
                path = %spec.path.display(),
                subtree = spec.subtree,
                "Started file watch"
            );
        }

        info!(roots = roots.len(), "Initialized filesystem bridge");

        Ok(Self {
            watcher,
            roots,
            dispatcher,
        })
    }

    /// Returns the directories being watched, canonicalized.
    #[must_use]
    pub fn roots(&self) -> &[WatchSpec] {
        &self.roots
    }
}

impl Drop for FsBridge {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// Resolves a watch root to its canonical directory.
///
/// # Errors
///
/// Returns an error if the directory does not exist or cannot be
/// canonicalized.
pub fn resolve_root(spec: &WatchSpec) -> Result<WatchSpec> {
    if !spec.path.is_dir() {
        return Err(WatcherError::DirectoryNotFound(spec.path.clone()));
    }
    Ok(WatchSpec::new(spec.path.canonicalize()?, spec.subtree))
}

/// Builds the registry watch item for a directory, using the same
/// canonical path [`FsBridge`] watches.
///
/// # Errors
///
/// Returns an error if the directory does not exist or its path cannot be
/// resolved.
pub fn watch_item(spec: &WatchSpec) -> Result<WatchItem> {
    let root = resolve_root(spec)?;
    let ids = ItemIdList::from_path_str(&root.path.to_string_lossy()).map_err(|source| {
        WatcherError::InvalidPath {
            path: root.path.clone(),
            source,
        }
    })?;
    Ok(WatchItem::new(ids, root.subtree))
}

/// Translates a notify callback result and queues the resulting changes.
///
/// Never blocks: if the channel is full the change is dropped with a
/// warning.
pub fn forward_event(
    res: std::result::Result<Event, notify::Error>,
    tx: &mpsc::Sender<ShellChange>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    for change in translate(&event) {
        if let Err(e) = tx.try_send(change) {
            warn!(error = %e, "Failed to queue shell change, channel may be full");
        }
    }
}

/// Spawns the task that raises queued changes on the registry.
///
/// Folder updates for `flat_roots` are raised before the change itself.
/// The task ends when every sender of `rx` has been dropped.
pub fn spawn_dispatcher(
    registry: Arc<ChangeNotifyRegistry>,
    flat_roots: Vec<PathBuf>,
    mut rx: mpsc::Receiver<ShellChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = rx.recv().await {
            for update in folder_updates(&change, &flat_roots) {
                dispatch_logged(&registry, &update);
            }
            dispatch_logged(&registry, &change);
        }

        debug!("Shell change dispatcher shutting down");
    })
}

fn dispatch_logged(registry: &ChangeNotifyRegistry, change: &ShellChange) {
    match dispatch_change(registry, change) {
        Ok(report) => trace!(
            events = %change.events,
            item1 = %change.item1.display(),
            delivered = report.delivered.len(),
            "Dispatched shell change"
        ),
        Err(e) => debug!(
            events = %change.events,
            item1 = %change.item1.display(),
            error = %e,
            "Shell change dropped"
        ),
    }
}

/// Raises one change on the registry with narrow-path items.
///
/// # Errors
///
/// Returns the registry's [`NotifyError`] if the change is malformed.
pub fn dispatch_change(
    registry: &ChangeNotifyRegistry,
    change: &ShellChange,
) -> std::result::Result<NotifyReport, NotifyError> {
    let item1 = change.item1.as_os_str().as_encoded_bytes();
    let item2 = change
        .item2
        .as_deref()
        .map(|path| Item::Narrow(path.as_os_str().as_encoded_bytes()));

    registry.notify(
        change.events,
        PayloadKind::NarrowPath,
        Some(Item::Narrow(item1)),
        item2,
    )
}
