//! Error types for the change-notification registry.
//!
//! Every failure is reported to the immediate caller as a value; nothing in
//! this crate escalates to a panic.
//!
//! # Error Types
//!
//! - [`RegistryError`] - registration and handle failures (out of memory,
//!   unknown handle)
//! - [`NotifyError`] - a change notification that was dropped, either because
//!   its arguments are malformed or because its payload kind is recognized
//!   but not implemented
//!
//! Path resolution failures are [`ResolveError`](crate::idlist::ResolveError)
//! and configuration failures are [`ConfigError`](crate::config::ConfigError).

use thiserror::Error;

use crate::events::{EventFamily, EventMask};
use crate::payload::PayloadKind;
use crate::store::Handle;

/// Errors from registry bookkeeping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Memory for a registration could not be reserved.
    ///
    /// The registry is left unchanged.
    #[error("out of memory")]
    OutOfMemory,

    /// The handle does not name a live registration.
    #[error("registration not found: {0}")]
    NotFound(Handle),
}

/// Reasons a change notification was dropped without delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The event value mixes bits of different families.
    #[error("mutually incompatible events listed: {0}")]
    IncompatibleEvents(EventMask),

    /// An item payload was supplied that the event family does not carry.
    #[error("{family} event carries unexpected item {position}")]
    UnexpectedItem {
        /// Family of the offending event.
        family: EventFamily,
        /// One-based item position (1 or 2).
        position: u8,
    },

    /// An item's representation does not agree with the declared kind.
    #[error("item payload does not match payload kind {expected}")]
    PayloadMismatch {
        /// The kind the caller declared.
        expected: PayloadKind,
    },

    /// The payload type field holds a value outside the vocabulary.
    #[error("unknown payload type {0:#x}")]
    UnknownPayloadType(u32),

    /// The payload kind is recognized but not implemented.
    #[error("payload kind {0} is not implemented")]
    UnsupportedPayload(PayloadKind),

    /// The entry point is recognized but not implemented.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl NotifyError {
    /// Returns `true` for "recognized but not implemented" failures, as
    /// opposed to malformed arguments.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedPayload(_) | Self::NotImplemented(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_out_of_memory_display() {
        assert_eq!(RegistryError::OutOfMemory.to_string(), "out of memory");
    }

    #[test]
    fn notify_error_incompatible_events_display() {
        let err = NotifyError::IncompatibleEvents(EventMask::CREATE | EventMask::ASSOCCHANGED);
        assert_eq!(
            err.to_string(),
            "mutually incompatible events listed: CREATE ASSOCCHANGED"
        );
    }

    #[test]
    fn notify_error_unexpected_item_display() {
        let err = NotifyError::UnexpectedItem {
            family: EventFamily::OneItem,
            position: 2,
        };
        assert_eq!(err.to_string(), "one-item event carries unexpected item 2");
    }

    #[test]
    fn notify_error_unknown_payload_display() {
        assert_eq!(
            NotifyError::UnknownPayloadType(0x7).to_string(),
            "unknown payload type 0x7"
        );
    }

    #[test]
    fn unsupported_is_distinct_from_invalid() {
        assert!(NotifyError::UnsupportedPayload(PayloadKind::PrinterNarrow).is_unsupported());
        assert!(NotifyError::NotImplemented("SHChangeNotifyUpdateEntryList").is_unsupported());
        assert!(!NotifyError::IncompatibleEvents(EventMask::ALLEVENTS).is_unsupported());
        assert!(!NotifyError::PayloadMismatch {
            expected: PayloadKind::WidePath
        }
        .is_unsupported());
    }
}
