//! Translation of filesystem events into shell change notifications.
//!
//! | `notify` event | Shell event |
//! |----------------|-------------|
//! | file created | `CREATE` |
//! | directory created | `MKDIR` |
//! | file removed | `DELETE` |
//! | directory removed | `RMDIR` |
//! | renamed (both paths known) | `RENAMEITEM` / `RENAMEFOLDER` |
//! | renamed away (source only) | `DELETE` |
//! | renamed in (destination only) | `CREATE` / `MKDIR` |
//! | data modified | `UPDATEITEM` |
//! | metadata modified | `ATTRIBUTES` |
//!
//! Access events and anything unclassified produce nothing. When the
//! backend does not say whether a path is a directory, the path is probed
//! on disk; a path that no longer exists counts as a file.
//!
//! A flat watch matches only its own directory, so [`folder_updates`]
//! reports a change to a direct child of a flat root as `UPDATEDIR` on
//! that root.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use shellnotify_registry::EventMask;
use tracing::trace;

/// One shell change notification derived from a filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellChange {
    pub events: EventMask,
    pub item1: PathBuf,
    pub item2: Option<PathBuf>,
}

impl ShellChange {
    #[must_use]
    pub fn one(events: EventMask, item: impl Into<PathBuf>) -> Self {
        Self {
            events,
            item1: item.into(),
            item2: None,
        }
    }

    #[must_use]
    pub fn two(events: EventMask, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            events,
            item1: from.into(),
            item2: Some(to.into()),
        }
    }
}

/// Translates one filesystem event into zero or more shell changes.
#[must_use]
pub fn translate(event: &Event) -> Vec<ShellChange> {
    let per_path = |events: EventMask| -> Vec<ShellChange> {
        event
            .paths
            .iter()
            .map(|path| ShellChange::one(events, path))
            .collect()
    };

    match event.kind {
        EventKind::Create(CreateKind::Folder) => per_path(EventMask::MKDIR),
        EventKind::Create(CreateKind::File) => per_path(EventMask::CREATE),
        EventKind::Create(_) => event.paths.iter().map(|p| appeared(p)).collect(),

        EventKind::Remove(RemoveKind::Folder) => per_path(EventMask::RMDIR),
        EventKind::Remove(_) => per_path(EventMask::DELETE),

        EventKind::Modify(ModifyKind::Name(mode)) => renamed(mode, &event.paths),
        EventKind::Modify(ModifyKind::Metadata(_)) => per_path(EventMask::ATTRIBUTES),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
            per_path(EventMask::UPDATEITEM)
        }

        _ => {
            trace!(kind = ?event.kind, "Ignoring event kind");
            Vec::new()
        }
    }
}

/// `UPDATEDIR` changes for the flat roots whose direct children `change`
/// touches, at most one per root.
#[must_use]
pub fn folder_updates(change: &ShellChange, flat_roots: &[PathBuf]) -> Vec<ShellChange> {
    let mut updates: Vec<ShellChange> = Vec::new();
    let touched = std::iter::once(change.item1.as_path()).chain(change.item2.as_deref());

    for parent in touched.filter_map(Path::parent) {
        let is_flat_root = flat_roots.iter().any(|root| root == parent);
        if is_flat_root && !updates.iter().any(|u| u.item1 == parent) {
            updates.push(ShellChange::one(EventMask::UPDATEDIR, parent));
        }
    }
    updates
}

fn renamed(mode: RenameMode, paths: &[PathBuf]) -> Vec<ShellChange> {
    match (mode, paths) {
        (RenameMode::Both, [from, to]) => {
            let events = if to.is_dir() {
                EventMask::RENAMEFOLDER
            } else {
                EventMask::RENAMEITEM
            };
            vec![ShellChange::two(events, from, to)]
        }
        (RenameMode::From, _) => paths
            .iter()
            .map(|p| ShellChange::one(EventMask::DELETE, p))
            .collect(),
        (RenameMode::To, _) => paths.iter().map(|p| appeared(p)).collect(),
        (RenameMode::Any, _) => paths
            .iter()
            .map(|p| {
                if p.exists() {
                    appeared(p)
                } else {
                    ShellChange::one(EventMask::DELETE, p)
                }
            })
            .collect(),
        _ => {
            trace!(mode = ?mode, count = paths.len(), "Ignoring rename event");
            Vec::new()
        }
    }
}

fn appeared(path: &Path) -> ShellChange {
    let events = if path.is_dir() {
        EventMask::MKDIR
    } else {
        EventMask::CREATE
    };
    ShellChange::one(events, path)
}
