//! The change-notification registry and dispatcher.
//!
//! [`ChangeNotifyRegistry`] owns every watch registration behind a single
//! lock. Clients register interest in event kinds and locations, the
//! dispatcher ([`notify`](ChangeNotifyRegistry::notify)) delivers matching
//! changes to them, and a notified client collects the change with
//! [`lock_consume`](ChangeNotifyRegistry::lock_consume).
//!
//! # Locking
//!
//! One reentrant lock guards all registry state. `notify` holds it for the
//! whole scan, including the synchronous delivery callbacks, so two
//! notifications never interleave and a consume always observes the state
//! left by exactly one completed notification. Because the lock is
//! reentrant, a callback running on the notifying thread may consume or
//! deregister without deadlocking; the scan walks a snapshot of handles and
//! skips any registration removed in the meantime.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use shellnotify_registry::delivery::{NotifyTarget, RecordingSink, WindowId};
//! use shellnotify_registry::events::EventMask;
//! use shellnotify_registry::idlist::ItemIdList;
//! use shellnotify_registry::payload::{Item, PayloadKind};
//! use shellnotify_registry::registry::ChangeNotifyRegistry;
//! use shellnotify_registry::store::WatchItem;
//!
//! let registry = ChangeNotifyRegistry::default();
//! let sink = Arc::new(RecordingSink::new());
//! let docs = ItemIdList::from_path_str("/docs")?;
//!
//! let handle = registry.register(
//!     NotifyTarget::new(WindowId(1), 0x0401, sink.clone()),
//!     0,
//!     EventMask::CREATE,
//!     &[WatchItem::new(docs, true)],
//! )?;
//!
//! registry.notify(
//!     EventMask::CREATE,
//!     PayloadKind::NarrowPath,
//!     Some(Item::from("/docs/readme.txt")),
//!     None,
//! )?;
//!
//! assert_eq!(sink.len(), 1);
//! let lock = registry.lock_consume(handle)?;
//! assert_eq!(lock.events(), EventMask::CREATE);
//! assert!(registry.unlock_consume(lock));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::cell::RefCell;
use std::fmt;

use parking_lot::ReentrantMutex;
use tracing::{debug, info, trace, warn};

use crate::config::{RegistryConfig, TwoItemMatching};
use crate::delivery::{NotifyTarget, WindowId};
use crate::error::{NotifyError, RegistryError};
use crate::events::{classify, Classification, EventFamily, EventMask};
use crate::idlist::ItemIdList;
use crate::matcher::matches;
use crate::payload::{ensure_supported, resolve, Item, PayloadKind};
use crate::store::{Handle, Registration, Store, WatchItem};

/// A point-in-time copy of one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSnapshot {
    pub handle: Handle,
    pub window: WindowId,
    pub message: u32,
    pub items: Vec<WatchItem>,
    pub event_mask: EventMask,
    pub flags: u32,
    pub pending_event: EventMask,
    pub pending_path: Option<ItemIdList>,
}

impl From<&Registration> for RegistrationSnapshot {
    fn from(registration: &Registration) -> Self {
        Self {
            handle: registration.handle,
            window: registration.target.window(),
            message: registration.target.message(),
            items: registration.items.clone(),
            event_mask: registration.event_mask,
            flags: registration.flags,
            pending_event: registration.pending_event,
            pending_path: registration.pending_path.clone(),
        }
    }
}

/// What a consumer receives from [`ChangeNotifyRegistry::lock_consume`].
///
/// `paths` holds one entry per watch item of the registration, each a copy
/// of the most recently delivered first item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedNotification {
    handle: Handle,
    paths: Vec<Option<ItemIdList>>,
    events: EventMask,
}

impl LockedNotification {
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[must_use]
    pub fn paths(&self) -> &[Option<ItemIdList>] {
        &self.paths
    }

    /// Events accumulated since the previous consume.
    #[must_use]
    pub fn events(&self) -> EventMask {
        self.events
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<Option<ItemIdList>>, EventMask) {
        (self.paths, self.events)
    }
}

/// Outcome of a [`ChangeNotifyRegistry::notify`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Registrations that were delivered to, in delivery order.
    pub delivered: Vec<Handle>,
}

/// Registry of change-notification clients.
pub struct ChangeNotifyRegistry {
    config: RegistryConfig,
    store: ReentrantMutex<RefCell<Store>>,
}

impl Default for ChangeNotifyRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for ChangeNotifyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifyRegistry")
            .field("config", &self.config)
            .field("registrations", &self.len())
            .finish()
    }
}

impl ChangeNotifyRegistry {
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        debug!(
            two_item_matching = ?config.two_item_matching,
            origin_process = config.origin_process,
            "Created change notification registry"
        );
        Self {
            config,
            store: ReentrantMutex::new(RefCell::new(Store::new())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registers a client and returns its handle.
    ///
    /// `items` are copied; the caller keeps ownership of its own values.
    /// `flags` are stored for the client and not interpreted.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::OutOfMemory`] if the registration cannot be
    /// allocated. Nothing is registered in that case.
    pub fn register(
        &self,
        target: NotifyTarget,
        flags: u32,
        event_mask: EventMask,
        items: &[WatchItem],
    ) -> Result<Handle, RegistryError> {
        let window = target.window();
        let guard = self.store.lock();
        let mut store = guard.borrow_mut();
        let handle = store.insert(target, flags, event_mask, items)?;

        debug!(
            handle = %handle,
            window = %window,
            events = %event_mask,
            flags = format_args!("{flags:#x}"),
            item_count = items.len(),
            node = %store.get(handle).map(Registration::describe).unwrap_or_default(),
            "Registered change notification client"
        );
        Ok(handle)
    }

    /// Removes a registration. Returns `false` if the handle is unknown.
    pub fn deregister(&self, handle: Handle) -> bool {
        let guard = self.store.lock();
        let removed = guard.borrow_mut().remove(handle);

        match removed {
            Some(registration) => {
                debug!(
                    handle = %handle,
                    node = %registration.describe(),
                    "Deregistered change notification client"
                );
                true
            }
            None => {
                trace!(handle = %handle, "Deregister of unknown handle");
                false
            }
        }
    }

    /// Returns a copy of the registration named by `handle`.
    #[must_use]
    pub fn lookup(&self, handle: Handle) -> Option<RegistrationSnapshot> {
        let guard = self.store.lock();
        let store = guard.borrow();
        store.get(handle).map(RegistrationSnapshot::from)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live handles, oldest first.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle> {
        self.store.lock().borrow().handles()
    }

    /// Dispatches a change to every relevant registration.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] and delivers nothing when the event mixes
    /// families, carries items its family does not have, declares items in
    /// a representation other than `kind`, or uses an unimplemented kind.
    /// An item whose path cannot be resolved is treated as absent.
    pub fn notify(
        &self,
        events: EventMask,
        kind: PayloadKind,
        item1: Option<Item<'_>>,
        item2: Option<Item<'_>>,
    ) -> Result<NotifyReport, NotifyError> {
        trace!(
            events = %events,
            kind = %kind,
            has_item1 = item1.is_some(),
            has_item2 = item2.is_some(),
            "Change notification"
        );

        let class = validate(events, item1.is_some(), item2.is_some())?;

        if let Err(e) = ensure_supported(kind) {
            warn!(kind = %kind, "Change notification payload kind is not implemented");
            return Err(e);
        }

        let path1 = resolve(kind, item1)?;
        let path2 = resolve(kind, item2)?;
        if let Some(path) = path1.as_deref() {
            trace!(events = %events, item1 = %path, "Resolved first item");
        }
        if let Some(path) = path2.as_deref() {
            trace!(events = %events, item2 = %path, "Resolved second item");
        }

        Ok(self.dispatch(events, class, path1.as_deref(), path2.as_deref()))
    }

    fn dispatch(
        &self,
        events: EventMask,
        class: Classification,
        path1: Option<&ItemIdList>,
        path2: Option<&ItemIdList>,
    ) -> NotifyReport {
        let guard = self.store.lock();
        let handles = guard.borrow().handles();
        let mut report = NotifyReport::default();

        for handle in handles {
            let target = {
                let mut store = guard.borrow_mut();
                let Some(registration) = store.get_mut(handle) else {
                    trace!(handle = %handle, "Registration removed during dispatch");
                    continue;
                };

                trace!(handle = %handle, "Trying registration");
                if !self.is_relevant(registration, events, class, path1, path2) {
                    continue;
                }

                registration.signal(events, path1.cloned());
                debug!(
                    handle = %handle,
                    node = %registration.describe(),
                    events = %events,
                    "Notifying client"
                );
                registration.target.clone()
            };

            target.deliver(handle, self.config.origin_process);
            report.delivered.push(handle);
        }

        trace!(delivered = report.delivered.len(), "Notify done");
        report
    }

    fn is_relevant(
        &self,
        registration: &Registration,
        events: EventMask,
        class: Classification,
        path1: Option<&ItemIdList>,
        path2: Option<&ItemIdList>,
    ) -> bool {
        if !events.intersects(registration.event_mask) {
            return false;
        }

        registration.items.iter().any(|item| {
            let Some(watched) = item.path.as_ref() else {
                return true;
            };
            let subtree = item.watch_subtree;

            match class {
                Classification::NoItem => true,
                Classification::OneItem => matches(Some(watched), path1, subtree),
                Classification::TwoItem => {
                    matches(Some(watched), path1, subtree)
                        || (self.config.two_item_matching == TwoItemMatching::EitherItem
                            && matches(Some(watched), path2, subtree))
                }
                Classification::Unscoped | Classification::Invalid => false,
            }
        })
    }

    /// Retrieves and clears the pending notification of a registration.
    ///
    /// The returned paths repeat the last delivered first item once per
    /// watch item of the registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the handle is unknown.
    pub fn lock_consume(&self, handle: Handle) -> Result<LockedNotification, RegistryError> {
        let guard = self.store.lock();
        let mut store = guard.borrow_mut();

        let Some(registration) = store.get_mut(handle) else {
            warn!(handle = %handle, "Couldn't find registration to lock");
            return Err(RegistryError::NotFound(handle));
        };

        let paths = vec![registration.pending_path.clone(); registration.items.len()];
        let events = std::mem::take(&mut registration.pending_event);

        trace!(handle = %handle, events = %events, "Consumed pending notification");
        Ok(LockedNotification {
            handle,
            paths,
            events,
        })
    }

    /// Releases a consumed notification. Always succeeds.
    pub fn unlock_consume(&self, lock: LockedNotification) -> bool {
        trace!(handle = %lock.handle, "Unlocked notification");
        true
    }

    /// Removes every registration and returns how many were released.
    pub fn shutdown(&self) -> usize {
        let guard = self.store.lock();
        let drained = guard.borrow_mut().drain();
        info!(released = drained.len(), "Change notification registry shut down");
        drained.len()
    }
}

/// Checks item presence against the event family, then family mixing.
fn validate(
    events: EventMask,
    has_item1: bool,
    has_item2: bool,
) -> Result<Classification, NotifyError> {
    if events.intersects(EventMask::NO_ITEM_EVENTS) && (has_item1 || has_item2) {
        trace!(events = %events, "Items supplied for an event that carries none");
        return Err(NotifyError::UnexpectedItem {
            family: EventFamily::NoItem,
            position: if has_item1 { 1 } else { 2 },
        });
    }

    if events.intersects(EventMask::ONE_ITEM_EVENTS) && has_item2 {
        trace!(events = %events, "Second item supplied for a one-item event");
        return Err(NotifyError::UnexpectedItem {
            family: EventFamily::OneItem,
            position: 2,
        });
    }

    let class = classify(events);
    if class == Classification::Invalid {
        warn!(events = %events, "Mutually incompatible events listed");
        return Err(NotifyError::IncompatibleEvents(events));
    }

    Ok(class)
}
