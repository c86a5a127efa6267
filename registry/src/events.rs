//! Shell change event vocabulary and the event classifier.
//!
//! Event codes are 32-bit flag sets whose values are fixed by the Win32
//! `SHCNE_*` constants. Every event kind belongs to exactly one family,
//! determined by how many item paths travel with it:
//!
//! | Family | Items | Members |
//! |--------|-------|---------|
//! | [`NO_ITEM_EVENTS`](EventMask::NO_ITEM_EVENTS) | 0 | `ASSOCCHANGED` |
//! | [`ONE_ITEM_EVENTS`](EventMask::ONE_ITEM_EVENTS) | 1 | `CREATE`, `DELETE`, `MKDIR`, ... |
//! | [`TWO_ITEM_EVENTS`](EventMask::TWO_ITEM_EVENTS) | 2 | `RENAMEITEM`, `RENAMEFOLDER`, `UPDATEITEM` |
//!
//! The `EXTENDED_EVENT` and `INTERRUPT` bits are modifiers and may accompany
//! any single family.
//!
//! # Example
//!
//! ```rust
//! use shellnotify_registry::events::{classify, Classification, EventMask};
//!
//! assert_eq!(classify(EventMask::CREATE), Classification::OneItem);
//! assert_eq!(
//!     classify(EventMask::CREATE | EventMask::ASSOCCHANGED),
//!     Classification::Invalid
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A set of shell change event flags.
///
/// Bits outside the vocabulary are kept as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMask(u32);

bitflags! {
    // Single flags are listed in the order the shell's event dumper uses.
    impl EventMask: u32 {
        const RENAMEITEM = 0x0000_0001;
        const CREATE = 0x0000_0002;
        const DELETE = 0x0000_0004;
        const MKDIR = 0x0000_0008;
        const RMDIR = 0x0000_0010;
        const MEDIAINSERTED = 0x0000_0020;
        const MEDIAREMOVED = 0x0000_0040;
        const DRIVEREMOVED = 0x0000_0080;
        const DRIVEADD = 0x0000_0100;
        const NETSHARE = 0x0000_0200;
        const NETUNSHARE = 0x0000_0400;
        const ATTRIBUTES = 0x0000_0800;
        const UPDATEDIR = 0x0000_1000;
        const UPDATEITEM = 0x0000_2000;
        const SERVERDISCONNECT = 0x0000_4000;
        const UPDATEIMAGE = 0x0000_8000;
        const DRIVEADDGUI = 0x0001_0000;
        const RENAMEFOLDER = 0x0002_0000;
        const FREESPACE = 0x0004_0000;
        const EXTENDED_EVENT = 0x0400_0000;
        const ASSOCCHANGED = 0x0800_0000;
        const INTERRUPT = 0x8000_0000;

        /// Every event kind; the "match everything" mask.
        const ALLEVENTS = 0x7FFF_FFFF;
        const DISKEVENTS = 0x0002_381F;
        const GLOBALEVENTS = 0x0C05_81E0;

        /// Events that carry no item paths.
        const NO_ITEM_EVENTS = Self::ASSOCCHANGED.bits();

        /// Events that carry exactly one item path.
        const ONE_ITEM_EVENTS = Self::ATTRIBUTES.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::DRIVEADD.bits()
            | Self::DRIVEADDGUI.bits()
            | Self::DRIVEREMOVED.bits()
            | Self::FREESPACE.bits()
            | Self::MEDIAINSERTED.bits()
            | Self::MEDIAREMOVED.bits()
            | Self::MKDIR.bits()
            | Self::NETSHARE.bits()
            | Self::NETUNSHARE.bits()
            | Self::RMDIR.bits()
            | Self::SERVERDISCONNECT.bits()
            | Self::UPDATEDIR.bits()
            | Self::UPDATEIMAGE.bits();

        /// Events that carry two item paths.
        const TWO_ITEM_EVENTS = Self::RENAMEFOLDER.bits()
            | Self::RENAMEITEM.bits()
            | Self::UPDATEITEM.bits();

        /// Bits that may accompany any family.
        const MODIFIERS = Self::EXTENDED_EVENT.bits() | Self::INTERRUPT.bits();
    }
}

impl EventMask {
    pub const NONE: Self = Self::empty();

    /// Names of the set flags, in the order the shell reports them.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        self.iter_names()
            .filter(|(_, flag)| is_single(*flag))
            .map(|(name, _)| name)
    }

    /// Every named single flag, in the order the shell reports them.
    pub fn named() -> impl Iterator<Item = (EventMask, &'static str)> {
        Self::all()
            .iter_names()
            .filter(|(_, flag)| is_single(*flag))
            .map(|(name, flag)| (flag, name))
    }

    /// Looks up a flag or named set by its `SHCNE_` name, prefix and case
    /// optional.
    #[must_use]
    pub fn from_shell_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let upper = upper.strip_prefix("SHCNE_").unwrap_or(&upper);
        match upper {
            "NONE" => Some(Self::NONE),
            _ => Self::from_name(upper),
        }
    }
}

fn is_single(flag: EventMask) -> bool {
    flag.bits().count_ones() == 1
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALLEVENTS {
            return f.write_str("ALLEVENTS");
        }
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for name in self.names() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        if first {
            write!(f, "{:#010x}", self.bits())?;
        }
        Ok(())
    }
}

/// Error returned when an event mask string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid event mask '{0}': expected a number or names joined by '|'")]
pub struct ParseEventMaskError(String);

impl FromStr for EventMask {
    type Err = ParseEventMaskError;

    /// Accepts `0x`-prefixed hex, decimal, or names such as
    /// `CREATE|DELETE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ParseEventMaskError(s.to_string());

        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return u32::from_str_radix(hex, 16)
                .map(Self::from_bits_retain)
                .map_err(|_| invalid());
        }
        if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            return trimmed
                .parse()
                .map(Self::from_bits_retain)
                .map_err(|_| invalid());
        }

        trimmed.split('|').try_fold(Self::NONE, |mask, part| {
            Self::from_shell_name(part)
                .map(|flag| mask | flag)
                .ok_or_else(invalid)
        })
    }
}

impl From<u32> for EventMask {
    fn from(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }
}

impl From<EventMask> for u32 {
    fn from(mask: EventMask) -> Self {
        mask.bits()
    }
}

/// The number of item paths an event family carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFamily {
    NoItem,
    OneItem,
    TwoItem,
}

impl EventFamily {
    /// The full flag set of this family.
    #[must_use]
    pub const fn mask(self) -> EventMask {
        match self {
            Self::NoItem => EventMask::NO_ITEM_EVENTS,
            Self::OneItem => EventMask::ONE_ITEM_EVENTS,
            Self::TwoItem => EventMask::TWO_ITEM_EVENTS,
        }
    }

    /// Maximum number of item payloads an event of this family may carry.
    #[must_use]
    pub const fn item_count(self) -> usize {
        match self {
            Self::NoItem => 0,
            Self::OneItem => 1,
            Self::TwoItem => 2,
        }
    }
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItem => f.write_str("no-item"),
            Self::OneItem => f.write_str("one-item"),
            Self::TwoItem => f.write_str("two-item"),
        }
    }
}

/// Result of classifying a raw event value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NoItem,
    OneItem,
    TwoItem,
    /// No family bits at all; only modifiers, or zero.
    ///
    /// Such an event reaches only watch items without a path.
    Unscoped,
    /// Bits from more than one family, or bits outside the vocabulary.
    Invalid,
}

impl Classification {
    /// The family, if the event belongs to exactly one.
    #[must_use]
    pub const fn family(self) -> Option<EventFamily> {
        match self {
            Self::NoItem => Some(EventFamily::NoItem),
            Self::OneItem => Some(EventFamily::OneItem),
            Self::TwoItem => Some(EventFamily::TwoItem),
            Self::Unscoped | Self::Invalid => None,
        }
    }
}

/// Classifies `events` into its family.
#[must_use]
pub fn classify(events: EventMask) -> Classification {
    let kinds = events & !EventMask::MODIFIERS;
    if kinds.is_empty() {
        return Classification::Unscoped;
    }

    let families = [
        (EventMask::NO_ITEM_EVENTS, Classification::NoItem),
        (EventMask::ONE_ITEM_EVENTS, Classification::OneItem),
        (EventMask::TWO_ITEM_EVENTS, Classification::TwoItem),
    ];

    for (mask, class) in families {
        if kinds.intersects(mask) {
            return if (kinds & !mask).is_empty() {
                class
            } else {
                Classification::Invalid
            };
        }
    }

    Classification::Invalid
}
