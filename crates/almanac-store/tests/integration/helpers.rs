//! Shared fixtures for store integration tests.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use almanac_store::{CalComponent, CalendarStore, ComponentStore, FileStore, FileStoreOptions};

/// ## Summary
/// Opens and loads a store over `dir` with a short save delay.
pub fn open(dir: &Path, delay_ms: u64) -> CalendarStore<FileStore> {
    let options = FileStoreOptions {
        save_delay: Duration::from_millis(delay_ms),
    };
    let store = CalendarStore::new(FileStore::new(dir, options).unwrap());
    assert!(store.load());
    store
}

/// ## Summary
/// Builds a VEVENT with the given UID, optional RECURRENCE-ID and any
/// extra content lines (CRLF-terminated).
pub fn event(uid: &str, rid: Option<&str>, extra: &str) -> CalComponent {
    let mut text = format!("BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:Event {uid}\r\n");
    if let Some(rid) = rid {
        text.push_str(&format!("RECURRENCE-ID:{rid}\r\n"));
    }
    text.push_str(extra);
    text.push_str("END:VEVENT\r\n");
    CalComponent::from_ical_string(&text).unwrap()
}

pub fn todo(uid: &str) -> CalComponent {
    CalComponent::from_ical_string(&format!(
        "BEGIN:VTODO\r\nUID:{uid}\r\nSUMMARY:Task {uid}\r\nDUE:20240110T170000Z\r\nEND:VTODO\r\n"
    ))
    .unwrap()
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

/// ## Summary
/// Returns the sorted UIDs of a set of components.
pub fn uids(components: &[std::sync::Arc<CalComponent>]) -> Vec<String> {
    let mut uids: Vec<String> = components
        .iter()
        .filter_map(|c| c.uid().map(str::to_string))
        .collect();
    uids.sort();
    uids
}
