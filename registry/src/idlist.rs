//! Structured path identities.
//!
//! The shell compares locations as item identifier lists rather than as
//! strings: a path is parsed once into its components and all later
//! comparisons are structural. An [`ItemIdList`] is that parsed form.
//!
//! The first component of an absolute path is its root: `/` for a path
//! starting with a single separator, `X:` for a drive, or `\\` for a UNC
//! path. The empty list is the namespace root itself and is an ancestor of
//! every other list.
//!
//! # Example
//!
//! ```rust
//! use shellnotify_registry::idlist::ItemIdList;
//!
//! let docs = ItemIdList::from_path_str("/docs")?;
//! let readme = ItemIdList::from_path_str("/docs/./readme.txt")?;
//!
//! assert!(docs.is_parent_of(&readme, true));
//! assert_eq!(readme.to_string(), "/docs/readme.txt");
//! # Ok::<(), shellnotify_registry::idlist::ResolveError>(())
//! ```

use std::fmt;

use thiserror::Error;

/// Root component for paths that start with a single separator.
const SLASH_ROOT: &str = "/";

/// Root component for UNC paths.
const UNC_ROOT: &str = "\\\\";

/// Errors that can occur while resolving a textual path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The path has no content.
    #[error("path is empty")]
    Empty,

    /// A narrow path is not valid UTF-8.
    #[error("path is not valid UTF-8")]
    InvalidUtf8,

    /// A wide path contains an unpaired surrogate.
    #[error("path is not valid UTF-16")]
    InvalidUtf16,

    /// The path contains a NUL character before its end.
    #[error("path contains an interior NUL character")]
    InteriorNul,

    /// A `..` component walks above the root.
    #[error("path escapes its root: {0}")]
    EscapesRoot(String),
}

/// One component of an [`ItemIdList`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_drive(&self) -> bool {
        is_drive_prefix(&self.0) && self.0.len() == 2
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed, structurally comparable path identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ItemIdList {
    ids: Vec<ItemId>,
}

impl ItemIdList {
    /// The namespace root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Resolves a textual path.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the path is empty, contains a NUL, or
    /// uses `..` to leave its root.
    pub fn from_path_str(path: &str) -> Result<Self, ResolveError> {
        if path.contains('\0') {
            return Err(ResolveError::InteriorNul);
        }
        parse(path)
    }

    /// Resolves a narrow (byte) path, stopping at the first NUL.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidUtf8`] for undecodable bytes, or any
    /// error [`from_path_str`](Self::from_path_str) reports.
    pub fn from_narrow(path: &[u8]) -> Result<Self, ResolveError> {
        let end = path.iter().position(|&b| b == 0).unwrap_or(path.len());
        let text = std::str::from_utf8(&path[..end]).map_err(|_| ResolveError::InvalidUtf8)?;
        parse(text)
    }

    /// Resolves a wide (UTF-16) path, stopping at the first NUL.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidUtf16`] for unpaired surrogates, or any
    /// error [`from_path_str`](Self::from_path_str) reports.
    pub fn from_wide(path: &[u16]) -> Result<Self, ResolveError> {
        let end = path.iter().position(|&c| c == 0).unwrap_or(path.len());
        let text = String::from_utf16(&path[..end]).map_err(|_| ResolveError::InvalidUtf16)?;
        parse(&text)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.ids.iter()
    }

    /// The final component, if any.
    #[must_use]
    pub fn last(&self) -> Option<&ItemId> {
        self.ids.last()
    }

    /// The list with its final component removed.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.ids.is_empty() {
            return None;
        }
        Some(Self {
            ids: self.ids[..self.ids.len() - 1].to_vec(),
        })
    }

    /// Returns `true` if `self` is a strict ancestor of `child`.
    ///
    /// With `immediate` set, only direct children qualify.
    #[must_use]
    pub fn is_parent_of(&self, child: &Self, immediate: bool) -> bool {
        if child.ids.len() <= self.ids.len() {
            return false;
        }
        if immediate && child.ids.len() != self.ids.len() + 1 {
            return false;
        }
        child.ids.starts_with(&self.ids)
    }
}

impl fmt::Display for ItemIdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((first, rest)) = self.ids.split_first() else {
            return Ok(());
        };

        let (lead, sep) = match first.as_str() {
            SLASH_ROOT => (SLASH_ROOT.to_string(), "/"),
            UNC_ROOT => (UNC_ROOT.to_string(), "\\"),
            _ if first.is_drive() => (format!("{first}\\"), "\\"),
            _ => {
                f.write_str(first.as_str())?;
                for id in rest {
                    write!(f, "/{id}")?;
                }
                return Ok(());
            }
        };

        f.write_str(&lead)?;
        for (i, id) in rest.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            f.write_str(id.as_str())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ItemIdList {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path_str(s)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn parse(path: &str) -> Result<ItemIdList, ResolveError> {
    if path.is_empty() {
        return Err(ResolveError::Empty);
    }

    let mut ids = Vec::new();
    let rest = if path.starts_with("\\\\") || path.starts_with("//") {
        ids.push(ItemId(UNC_ROOT.to_string()));
        &path[2..]
    } else if path.starts_with(is_separator) {
        ids.push(ItemId(SLASH_ROOT.to_string()));
        &path[1..]
    } else if is_drive_prefix(path) {
        ids.push(ItemId(path[..2].to_ascii_uppercase()));
        &path[2..]
    } else {
        path
    };
    let rooted = !ids.is_empty();

    for part in rest.split(is_separator) {
        match part {
            "" | "." => {}
            ".." => {
                let floor = usize::from(rooted);
                if ids.len() <= floor {
                    return Err(ResolveError::EscapesRoot(path.to_string()));
                }
                ids.pop();
            }
            name => ids.push(ItemId(name.to_string())),
        }
    }

    Ok(ItemIdList { ids })
}
