//! Path relevance test used by the dispatcher.

use crate::idlist::ItemIdList;

/// Decides whether a change at `changed` is relevant to a watch on `watched`.
///
/// An absent watched path never matches here; the dispatcher handles the
/// "watch everything" case before calling this. An absent changed path
/// (an item that failed to resolve) never matches either.
#[must_use]
pub fn matches(watched: Option<&ItemIdList>, changed: Option<&ItemIdList>, subtree: bool) -> bool {
    let (Some(watched), Some(changed)) = (watched, changed) else {
        return false;
    };

    if watched == changed {
        return true;
    }

    subtree && watched.is_parent_of(changed, false)
}
