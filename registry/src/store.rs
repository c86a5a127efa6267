//! Storage for watch registrations.
//!
//! Registrations live in an arena of slots addressed by generation-checked
//! [`Handle`]s. A handle whose slot has since been freed (and possibly
//! reused) carries an older generation and no longer resolves, so a stale
//! handle can never reach another client's registration.
//!
//! Insertion order is kept by index links between occupied slots, which
//! gives O(1) append, lookup and removal while the dispatcher still visits
//! registrations oldest first.
//!
//! The store itself is not synchronized; [`ChangeNotifyRegistry`] wraps it
//! in its lock.
//!
//! [`ChangeNotifyRegistry`]: crate::registry::ChangeNotifyRegistry

use std::fmt;

use tracing::trace;

use crate::delivery::NotifyTarget;
use crate::error::RegistryError;
use crate::events::EventMask;
use crate::idlist::ItemIdList;

/// Opaque identity of a live registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Packs the handle into the integer form used at the Win32 boundary.
    ///
    /// Generations start at 1, so a live handle never packs to zero.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpacks a handle produced by [`as_raw`](Self::as_raw).
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.as_raw())
    }
}

/// One watched location of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchItem {
    /// The watched path; `None` watches everything.
    pub path: Option<ItemIdList>,
    /// Whether descendants of `path` are watched too.
    pub watch_subtree: bool,
}

impl WatchItem {
    #[must_use]
    pub fn new(path: ItemIdList, watch_subtree: bool) -> Self {
        Self {
            path: Some(path),
            watch_subtree,
        }
    }

    /// A watch item without a path, relevant to every event in the mask.
    #[must_use]
    pub fn everything() -> Self {
        Self {
            path: None,
            watch_subtree: false,
        }
    }
}

/// A client's subscription and its undelivered state.
#[derive(Debug)]
pub(crate) struct Registration {
    pub(crate) handle: Handle,
    pub(crate) target: NotifyTarget,
    pub(crate) items: Vec<WatchItem>,
    pub(crate) event_mask: EventMask,
    pub(crate) flags: u32,
    pub(crate) pending_event: EventMask,
    pub(crate) pending_path: Option<ItemIdList>,
}

impl Registration {
    /// Records a delivered event, replacing the previous pending path.
    pub(crate) fn signal(&mut self, events: EventMask, path: Option<ItemIdList>) {
        self.pending_path = path;
        self.pending_event |= events;
    }

    /// Human-readable name for logs: the first watched path.
    pub(crate) fn describe(&self) -> String {
        match self.items.first().and_then(|item| item.path.as_ref()) {
            Some(path) => path.to_string(),
            None => "<everything>".to_string(),
        }
    }
}

#[derive(Debug)]
struct Node {
    registration: Registration,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of registrations in insertion order.
#[derive(Debug, Default)]
pub(crate) struct Store {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl Store {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Adds a registration at the tail, copying `items`.
    ///
    /// All memory is reserved before anything is linked, so a failure
    /// leaves the store untouched.
    pub(crate) fn insert(
        &mut self,
        target: NotifyTarget,
        flags: u32,
        event_mask: EventMask,
        items: &[WatchItem],
    ) -> Result<Handle, RegistryError> {
        let mut copied = Vec::new();
        copied
            .try_reserve_exact(items.len())
            .map_err(|_| RegistryError::OutOfMemory)?;
        copied.extend(items.iter().cloned());

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| RegistryError::OutOfMemory)?;
                self.slots
                    .try_reserve(1)
                    .map_err(|_| RegistryError::OutOfMemory)?;
                self.slots.push(Slot {
                    generation: 1,
                    node: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.node.is_none(), "free list pointed at an occupied slot");
        let handle = Handle {
            index,
            generation: slot.generation,
        };

        slot.node = Some(Node {
            registration: Registration {
                handle,
                target,
                items: copied,
                event_mask,
                flags,
                pending_event: EventMask::NONE,
                pending_path: None,
            },
            prev: self.tail,
            next: None,
        });

        match self.tail {
            Some(tail) => self.link_next(tail, Some(index)),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        trace!(handle = %handle, "Linked registration");
        Ok(handle)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&Registration> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref().map(|node| &node.registration)
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut Registration> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut().map(|node| &mut node.registration)
    }

    /// Unlinks and returns the registration named by `handle`.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<Registration> {
        self.get(handle)?;

        let slot = &mut self.slots[handle.index as usize];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);

        match node.prev {
            Some(prev) => self.link_next(prev, node.next),
            None => {
                debug_assert_eq!(self.head, Some(handle.index));
                self.head = node.next;
            }
        }
        match node.next {
            Some(next) => self.link_prev(next, node.prev),
            None => {
                debug_assert_eq!(self.tail, Some(handle.index));
                self.tail = node.prev;
            }
        }

        self.free.push(handle.index);
        self.len -= 1;

        trace!(handle = %handle, "Unlinked registration");
        Some(node.registration)
    }

    /// Live handles, oldest first.
    pub(crate) fn handles(&self) -> Vec<Handle> {
        self.iter().map(|registration| registration.handle).collect()
    }

    /// Live registrations, oldest first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Registration> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let node = self.slots[index as usize].node.as_ref()?;
            cursor = node.next;
            Some(&node.registration)
        })
    }

    /// Removes every registration, oldest first.
    pub(crate) fn drain(&mut self) -> Vec<Registration> {
        let handles = self.handles();
        handles
            .into_iter()
            .filter_map(|handle| self.remove(handle))
            .collect()
    }

    fn node_mut(&mut self, index: u32) -> Option<&mut Node> {
        let node = self
            .slots
            .get_mut(index as usize)
            .and_then(|slot| slot.node.as_mut());
        debug_assert!(node.is_some(), "linked index must refer to an occupied slot");
        node
    }

    fn link_next(&mut self, index: u32, next: Option<u32>) {
        if let Some(node) = self.node_mut(index) {
            node.next = next;
        }
    }

    fn link_prev(&mut self, index: u32, prev: Option<u32>) {
        if let Some(node) = self.node_mut(index) {
            node.prev = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{RecordingSink, WindowId};
    use std::sync::Arc;

    fn target() -> NotifyTarget {
        NotifyTarget::new(WindowId(1), 0x400, Arc::new(RecordingSink::new()))
    }

    fn item(path: &str) -> WatchItem {
        WatchItem::new(ItemIdList::from_path_str(path).unwrap(), true)
    }

    fn insert(store: &mut Store, path: &str) -> Handle {
        store
            .insert(target(), 0, EventMask::ALLEVENTS, &[item(path)])
            .unwrap()
    }

    // ========================================================================
    // Handles
    // ========================================================================

    #[test]
    fn raw_handle_round_trips() {
        let mut store = Store::new();
        let handle = insert(&mut store, "/a");
        assert_ne!(handle.as_raw(), 0);
        assert_eq!(Handle::from_raw(handle.as_raw()), handle);
    }

    #[test]
    fn stale_handle_does_not_resolve_after_slot_reuse() {
        let mut store = Store::new();
        let old = insert(&mut store, "/a");
        store.remove(old).unwrap();
        let new = insert(&mut store, "/b");

        assert_eq!(old.index, new.index);
        assert_ne!(old, new);
        assert!(store.get(old).is_none());
        assert!(store.get(new).is_some());
        assert!(store.remove(old).is_none());
    }

    #[test]
    fn unknown_handle_does_not_resolve() {
        let store = Store::new();
        assert!(store.get(Handle::from_raw(0)).is_none());
        assert!(store.get(Handle::from_raw(0x1_0000_0005)).is_none());
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut store = Store::new();
        let a = insert(&mut store, "/a");
        let b = insert(&mut store, "/b");
        let c = insert(&mut store, "/c");
        assert_eq!(store.handles(), vec![a, b, c]);
    }

    #[test]
    fn removal_from_middle_head_and_tail() {
        let mut store = Store::new();
        let a = insert(&mut store, "/a");
        let b = insert(&mut store, "/b");
        let c = insert(&mut store, "/c");
        let d = insert(&mut store, "/d");

        store.remove(b).unwrap();
        assert_eq!(store.handles(), vec![a, c, d]);
        store.remove(a).unwrap();
        assert_eq!(store.handles(), vec![c, d]);
        store.remove(d).unwrap();
        assert_eq!(store.handles(), vec![c]);
        store.remove(c).unwrap();
        assert!(store.handles().is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn reused_slot_is_appended_at_tail() {
        let mut store = Store::new();
        let a = insert(&mut store, "/a");
        let b = insert(&mut store, "/b");
        store.remove(a).unwrap();
        let c = insert(&mut store, "/c");
        assert_eq!(store.handles(), vec![b, c]);
    }

    // ========================================================================
    // Contents
    // ========================================================================

    #[test]
    fn insert_copies_watch_items() {
        let mut store = Store::new();
        let items = vec![item("/a"), WatchItem::everything()];
        let handle = store
            .insert(target(), 7, EventMask::CREATE, &items)
            .unwrap();
        drop(items);

        let registration = store.get(handle).unwrap();
        assert_eq!(registration.items.len(), 2);
        assert_eq!(registration.flags, 7);
        assert_eq!(registration.event_mask, EventMask::CREATE);
        assert!(registration.pending_event.is_empty());
        assert!(registration.pending_path.is_none());
    }

    #[test]
    fn signal_accumulates_events_and_replaces_path() {
        let mut store = Store::new();
        let handle = insert(&mut store, "/a");
        let registration = store.get_mut(handle).unwrap();

        registration.signal(EventMask::CREATE, Some(ItemIdList::from_path_str("/a/1").unwrap()));
        registration.signal(EventMask::DELETE, Some(ItemIdList::from_path_str("/a/2").unwrap()));

        assert_eq!(registration.pending_event, EventMask::CREATE | EventMask::DELETE);
        assert_eq!(registration.pending_path.as_ref().unwrap().to_string(), "/a/2");
    }

    #[test]
    fn describe_uses_first_watched_path() {
        let mut store = Store::new();
        let handle = insert(&mut store, "/a/b");
        assert_eq!(store.get(handle).unwrap().describe(), "/a/b");

        let everything = store
            .insert(target(), 0, EventMask::ALLEVENTS, &[WatchItem::everything()])
            .unwrap();
        assert_eq!(store.get(everything).unwrap().describe(), "<everything>");
    }

    #[test]
    fn drain_empties_store() {
        let mut store = Store::new();
        insert(&mut store, "/a");
        insert(&mut store, "/b");
        let drained = store.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(store.len(), 0);
        assert!(store.iter().next().is_none());
    }
}
