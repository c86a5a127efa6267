//! Item payloads carried by change notifications.
//!
//! A notification names its items either as textual paths (narrow or wide)
//! or as already resolved [`ItemIdList`]s. The declared [`PayloadKind`]
//! corresponds to the `SHCNF_TYPE` field of the Win32 flags word.

use std::borrow::Cow;
use std::fmt;

use tracing::debug;

use crate::error::NotifyError;
use crate::idlist::ItemIdList;

pub const SHCNF_IDLIST: u32 = 0x0000;
pub const SHCNF_PATHA: u32 = 0x0001;
pub const SHCNF_PRINTERA: u32 = 0x0002;
pub const SHCNF_DWORD: u32 = 0x0003;
pub const SHCNF_PATHW: u32 = 0x0005;
pub const SHCNF_PRINTERW: u32 = 0x0006;
pub const SHCNF_TYPE: u32 = 0x00FF;
pub const SHCNF_FLUSH: u32 = 0x1000;
pub const SHCNF_FLUSHNOWAIT: u32 = 0x2000;

/// How the items of a notification are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// Pre-resolved [`ItemIdList`]s owned by the caller.
    IdList,
    /// NUL-terminated byte paths.
    NarrowPath,
    /// NUL-terminated UTF-16 paths.
    WidePath,
    /// Narrow printer names; not implemented.
    PrinterNarrow,
    /// Wide printer names; not implemented.
    PrinterWide,
    /// Raw DWORD values; not implemented.
    Dword,
}

impl PayloadKind {
    /// The `SHCNF_TYPE` value of this kind.
    #[must_use]
    pub const fn type_code(self) -> u32 {
        match self {
            Self::IdList => SHCNF_IDLIST,
            Self::NarrowPath => SHCNF_PATHA,
            Self::PrinterNarrow => SHCNF_PRINTERA,
            Self::Dword => SHCNF_DWORD,
            Self::WidePath => SHCNF_PATHW,
            Self::PrinterWide => SHCNF_PRINTERW,
        }
    }

    /// Decodes the type field of a Win32 flags word; flush bits are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::UnknownPayloadType`] if the type field holds a
    /// value outside the vocabulary.
    pub fn from_flags(flags: u32) -> Result<Self, NotifyError> {
        match flags & SHCNF_TYPE {
            SHCNF_IDLIST => Ok(Self::IdList),
            SHCNF_PATHA => Ok(Self::NarrowPath),
            SHCNF_PRINTERA => Ok(Self::PrinterNarrow),
            SHCNF_DWORD => Ok(Self::Dword),
            SHCNF_PATHW => Ok(Self::WidePath),
            SHCNF_PRINTERW => Ok(Self::PrinterWide),
            other => Err(NotifyError::UnknownPayloadType(other)),
        }
    }

    /// Returns `true` for kinds that carry textual paths needing resolution.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::NarrowPath | Self::WidePath)
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdList => "SHCNF_IDLIST",
            Self::NarrowPath => "SHCNF_PATHA",
            Self::WidePath => "SHCNF_PATHW",
            Self::PrinterNarrow => "SHCNF_PRINTERA",
            Self::PrinterWide => "SHCNF_PRINTERW",
            Self::Dword => "SHCNF_DWORD",
        };
        f.write_str(name)
    }
}

/// One item of a notification, in the representation its kind declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item<'a> {
    IdList(&'a ItemIdList),
    Narrow(&'a [u8]),
    Wide(&'a [u16]),
}

impl<'a> From<&'a ItemIdList> for Item<'a> {
    fn from(list: &'a ItemIdList) -> Self {
        Self::IdList(list)
    }
}

impl<'a> From<&'a str> for Item<'a> {
    fn from(path: &'a str) -> Self {
        Self::Narrow(path.as_bytes())
    }
}

impl<'a> From<&'a [u16]> for Item<'a> {
    fn from(path: &'a [u16]) -> Self {
        Self::Wide(path)
    }
}

/// Checks that `kind` is implemented.
pub(crate) fn ensure_supported(kind: PayloadKind) -> Result<(), NotifyError> {
    match kind {
        PayloadKind::IdList | PayloadKind::NarrowPath | PayloadKind::WidePath => Ok(()),
        PayloadKind::PrinterNarrow | PayloadKind::PrinterWide | PayloadKind::Dword => {
            Err(NotifyError::UnsupportedPayload(kind))
        }
    }
}

/// Turns one item into a path identity.
///
/// Caller-supplied id lists are borrowed; textual paths are resolved into
/// owned lists that are dropped when the notification completes. A path
/// that fails to resolve yields `Ok(None)` so that only this item is lost.
///
/// # Errors
///
/// Returns [`NotifyError::PayloadMismatch`] if the item's representation
/// disagrees with `kind`.
pub(crate) fn resolve<'a>(
    kind: PayloadKind,
    item: Option<Item<'a>>,
) -> Result<Option<Cow<'a, ItemIdList>>, NotifyError> {
    let Some(item) = item else {
        return Ok(None);
    };

    let resolved = match (kind, item) {
        (PayloadKind::IdList, Item::IdList(list)) => return Ok(Some(Cow::Borrowed(list))),
        (PayloadKind::NarrowPath, Item::Narrow(path)) => ItemIdList::from_narrow(path),
        (PayloadKind::WidePath, Item::Wide(path)) => ItemIdList::from_wide(path),
        _ => return Err(NotifyError::PayloadMismatch { expected: kind }),
    };

    match resolved {
        Ok(list) => Ok(Some(Cow::Owned(list))),
        Err(e) => {
            debug!(kind = %kind, error = %e, "Failed to resolve item path");
            Ok(None)
        }
    }
}
