//! JSON-lines reporting of consumed notifications.
//!
//! Each consumed notification becomes one [`ConsumedRecord`] written as a
//! single line of JSON:
//!
//! ```json
//! {"timestamp":"2026-10-16T09:30:00Z","handle":"0x100000000","window":1,"event_bits":2,"events":["CREATE"],"paths":["/home/me/notes.txt"]}
//! ```

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shellnotify_registry::{classify, EventFamily, EventMask, LockedNotification, WindowId};

use crate::error::Result;

/// A consumed notification as reported by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumedRecord {
    pub timestamp: DateTime<Utc>,
    /// Registration handle in hex.
    pub handle: String,
    pub window: WindowId,
    pub event_bits: EventMask,
    pub events: Vec<&'static str>,
    /// One entry per watch item; `null` when the change had no path.
    pub paths: Vec<Option<String>>,
}

impl ConsumedRecord {
    #[must_use]
    pub fn new(window: WindowId, lock: &LockedNotification, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            handle: lock.handle().to_string(),
            window,
            event_bits: lock.events(),
            events: lock.events().names().collect(),
            paths: lock
                .paths()
                .iter()
                .map(|path| path.as_ref().map(ToString::to_string))
                .collect(),
        }
    }

    /// Writes the record as one line of JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_line<W: Write>(&self, out: &mut W) -> Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

/// One row of the event vocabulary listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRow {
    pub name: &'static str,
    pub bits: u32,
    /// `None` for the modifier bits.
    pub family: Option<EventFamily>,
}

/// The full event vocabulary in the shell's reporting order.
#[must_use]
pub fn event_table() -> Vec<EventRow> {
    EventMask::named()
        .map(|(flag, name)| EventRow {
            name,
            bits: flag.bits(),
            family: classify(flag).family(),
        })
        .collect()
}

/// Renders the vocabulary as aligned text.
#[must_use]
pub fn format_event_table(rows: &[EventRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let family = row
            .family
            .map_or_else(|| "modifier".to_string(), |family| family.to_string());
        out.push_str(&format!("{:<18} {:#010x}  {family}\n", row.name, row.bits));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shellnotify_registry::{
        ChangeNotifyRegistry, Item, NotifyTarget, PayloadKind, RecordingSink, WatchItem,
    };
    use std::sync::Arc;

    fn consumed(events: EventMask, path: Option<&str>) -> LockedNotification {
        let registry = ChangeNotifyRegistry::default();
        let handle = registry
            .register(
                NotifyTarget::new(WindowId(1), 1, Arc::new(RecordingSink::new())),
                0,
                EventMask::ALLEVENTS,
                &[WatchItem::everything(), WatchItem::everything()],
            )
            .unwrap();
        registry
            .notify(events, PayloadKind::NarrowPath, path.map(Item::from), None)
            .unwrap();
        registry.lock_consume(handle).unwrap()
    }

    #[test]
    fn record_lists_names_and_paths() {
        let lock = consumed(EventMask::CREATE, Some("/docs/a.txt"));
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();

        let record = ConsumedRecord::new(WindowId(1), &lock, at);

        assert_eq!(record.events, vec!["CREATE"]);
        assert_eq!(record.event_bits, EventMask::CREATE);
        assert_eq!(
            record.paths,
            vec![Some("/docs/a.txt".to_string()), Some("/docs/a.txt".to_string())]
        );
        assert_eq!(record.handle, lock.handle().to_string());
    }

    #[test]
    fn record_serializes_as_one_json_line() {
        let lock = consumed(EventMask::ASSOCCHANGED, None);
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let record = ConsumedRecord::new(WindowId(7), &lock, at);

        let mut out = Vec::new();
        record.write_line(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["timestamp"], "2026-10-16T09:30:00Z");
        assert_eq!(value["window"], 7);
        assert_eq!(value["event_bits"], EventMask::ASSOCCHANGED.bits());
        assert_eq!(value["events"][0], "ASSOCCHANGED");
        assert!(value["paths"][0].is_null());
    }

    #[test]
    fn event_table_covers_vocabulary() {
        let rows = event_table();

        assert_eq!(rows.len(), 22);
        let rename = rows.iter().find(|r| r.name == "RENAMEITEM").unwrap();
        assert_eq!(rename.bits, 0x1);
        assert_eq!(rename.family, Some(EventFamily::TwoItem));
        let interrupt = rows.iter().find(|r| r.name == "INTERRUPT").unwrap();
        assert_eq!(interrupt.family, None);
    }

    #[test]
    fn formatted_table_has_one_line_per_event() {
        let text = format_event_table(&event_table());
        assert_eq!(text.lines().count(), 22);
        assert!(text.contains("ASSOCCHANGED"));
        assert!(text.contains("no-item"));
        assert!(text.contains("modifier"));
    }
}
