//! Win32-shaped entry points over a [`ChangeNotifyRegistry`].
//!
//! These mirror the shell's exported functions: raw integer handles and
//! event words in, booleans and zero-on-failure handles out. The `NT`
//! variants are aliases kept for callers that import them by those names.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::delivery::{Deliver, NotifyTarget, WindowId};
use crate::error::NotifyError;
use crate::events::EventMask;
use crate::payload::{Item, PayloadKind};
use crate::registry::{ChangeNotifyRegistry, LockedNotification};
use crate::store::{Handle, WatchItem};

pub use crate::payload::{
    SHCNF_DWORD, SHCNF_FLUSH, SHCNF_FLUSHNOWAIT, SHCNF_IDLIST, SHCNF_PATHA, SHCNF_PATHW,
    SHCNF_PRINTERA, SHCNF_PRINTERW, SHCNF_TYPE,
};

/// Facade exposing the registry through the shell's calling conventions.
#[derive(Debug, Clone)]
pub struct ShellChangeNotify {
    registry: Arc<ChangeNotifyRegistry>,
}

impl ShellChangeNotify {
    #[must_use]
    pub fn new(registry: Arc<ChangeNotifyRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ChangeNotifyRegistry> {
        &self.registry
    }

    /// Registers `window` for `event_mask` changes under `items`.
    ///
    /// `sink` stands in for the window's message queue. Returns the raw
    /// handle, or `0` if the registration could not be allocated.
    pub fn register(
        &self,
        window: WindowId,
        sink: Arc<dyn Deliver>,
        flags: u32,
        event_mask: u32,
        message: u32,
        items: &[WatchItem],
    ) -> u64 {
        let target = NotifyTarget::new(window, message, sink);
        match self
            .registry
            .register(target, flags, EventMask::from_bits_retain(event_mask), items)
        {
            Ok(handle) => handle.as_raw(),
            Err(e) => {
                warn!(window = %window, error = %e, "Change notification registration failed");
                0
            }
        }
    }

    /// Alias of [`register`](Self::register).
    pub fn nt_register(
        &self,
        window: WindowId,
        sink: Arc<dyn Deliver>,
        flags: u32,
        event_mask: u32,
        message: u32,
        items: &[WatchItem],
    ) -> u64 {
        debug!(window = %window, "NT registration forwarded");
        self.register(window, sink, flags, event_mask, message, items)
    }

    /// Removes the registration named by `raw`.
    pub fn deregister(&self, raw: u64) -> bool {
        self.registry.deregister(Handle::from_raw(raw))
    }

    /// Alias of [`deregister`](Self::deregister).
    pub fn nt_deregister(&self, raw: u64) -> bool {
        debug!(handle = format_args!("{raw:#x}"), "NT deregistration forwarded");
        self.deregister(raw)
    }

    /// Raises a change notification.
    ///
    /// The payload kind is taken from `flags & SHCNF_TYPE`; flush bits are
    /// accepted and have no effect since delivery is always synchronous.
    /// Failures are logged, never returned.
    pub fn change_notify(
        &self,
        event_id: u32,
        flags: u32,
        item1: Option<Item<'_>>,
        item2: Option<Item<'_>>,
    ) {
        let events = EventMask::from_bits_retain(event_id);

        let result = PayloadKind::from_flags(flags)
            .and_then(|kind| self.registry.notify(events, kind, item1, item2));

        match result {
            Ok(report) => trace!(
                events = %events,
                delivered = report.delivered.len(),
                "Change notification dispatched"
            ),
            Err(e) if e.is_unsupported() => {
                debug!(events = %events, error = %e, "Change notification not implemented");
            }
            Err(e) => debug!(events = %events, error = %e, "Change notification dropped"),
        }
    }

    /// Retrieves the pending change of a registration.
    ///
    /// `process_id` names the caller's process and is not otherwise used.
    /// Returns `None` if `raw` names no registration.
    pub fn notification_lock(&self, raw: u64, process_id: u32) -> Option<LockedNotification> {
        trace!(handle = format_args!("{raw:#x}"), process_id, "Notification lock");
        self.registry.lock_consume(Handle::from_raw(raw)).ok()
    }

    pub fn notification_unlock(&self, lock: LockedNotification) -> bool {
        self.registry.unlock_consume(lock)
    }

    /// Recognized but not implemented.
    ///
    /// # Errors
    ///
    /// Always returns [`NotifyError::NotImplemented`].
    pub fn update_entry_list(&self, args: [u32; 4]) -> Result<(), NotifyError> {
        warn!(
            args = format_args!(
                "{:#010x} {:#010x} {:#010x} {:#010x}",
                args[0], args[1], args[2], args[3]
            ),
            "update_entry_list is not implemented"
        );
        Err(NotifyError::NotImplemented("update_entry_list"))
    }
}
