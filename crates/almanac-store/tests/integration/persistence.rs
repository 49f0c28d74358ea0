//! Tests for writing the store to disk and reading it back.

use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use almanac_core::constants::{CALENDAR_FILE_NAME, KEY_FILE_NAME};
use almanac_rfc::rfc::ical::parse::parse;
use almanac_store::{ComponentId, ComponentStore, Timezone};

use super::helpers::*;

// ============================================================================
// Round trip
// ============================================================================

/// ## Summary
/// Components, overrides and timezones survive a flush and reopen.
#[test_log::test(tokio::test)]
async fn reopened_store_has_same_contents() {
    let dir = tempfile::tempdir().unwrap();
    let originals = [
        event("single", None, "DTSTART:20240101T090000Z\r\n"),
        event(
            "series",
            None,
            "DTSTART:20240101T090000Z\r\nRRULE:FREQ=DAILY;COUNT=5\r\n",
        ),
        event(
            "series",
            Some("20240102T090000Z"),
            "DTSTART:20240102T110000Z\r\n",
        ),
        event(
            "series",
            Some("20240104T090000Z"),
            "DTSTART:20240104T130000Z\r\n",
        ),
        todo("chore"),
    ];

    {
        let store = open(dir.path(), 10_000);
        for component in &originals {
            assert!(store.put_component(component.clone()));
        }
        assert!(store.put_timezone(&Timezone::fixed("Custom/East", 3 * 3600)));
        assert!(store.put_timezone(&Timezone::fixed("Custom/West", -5 * 3600)));
        store.backend().flush().unwrap();
    }

    let store = open(dir.path(), 10_000);

    let mut ids = store.get_component_ids();
    ids.sort();
    let mut expected: Vec<ComponentId> = originals.iter().filter_map(|c| c.id()).collect();
    expected.sort();
    assert_eq!(ids, expected);

    for original in &originals {
        let stored = store
            .get_component(original.uid().unwrap(), original.recurrence_id())
            .unwrap();
        assert_eq!(stored.kind(), original.kind());
        assert_eq!(stored.as_ref(), original);
    }

    let mut offsets: BTreeMap<String, i32> = store
        .get_timezones()
        .iter()
        .map(|tz| {
            (
                tz.tzid().to_string(),
                tz.utc_offset().unwrap().local_minus_utc(),
            )
        })
        .collect();
    assert_eq!(offsets.remove("Custom/East"), Some(3 * 3600));
    assert_eq!(offsets.remove("Custom/West"), Some(-5 * 3600));
    assert!(offsets.is_empty());
}

/// ## Summary
/// Multi-valued and structured text properties are written back as read.
#[test_log::test(tokio::test)]
async fn list_and_structured_values_survive_save() {
    let dir = tempfile::tempdir().unwrap();
    let original = event(
        "tagged",
        None,
        "CATEGORIES:Work,Personal\r\nREQUEST-STATUS:2.0;Success\r\n",
    );
    let text = original.to_ical_string();
    assert!(text.contains("CATEGORIES:Work,Personal\r\n"));
    assert!(text.contains("REQUEST-STATUS:2.0;Success\r\n"));

    {
        let store = open(dir.path(), 10_000);
        assert!(store.put_component(original.clone()));
        store.backend().flush().unwrap();
    }

    let store = open(dir.path(), 10_000);
    let stored = store.get_component("tagged", None).unwrap();
    assert_eq!(stored.as_ref(), &original);
}

/// ## Summary
/// The calendar file is a single VCALENDAR written via a temporary file.
#[test_log::test(tokio::test)]
async fn saved_file_is_one_calendar_without_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);
    assert!(store.put_component(event("a", None, "")));
    store.backend().flush().unwrap();

    let text = fs::read_to_string(dir.path().join(CALENDAR_FILE_NAME)).unwrap();
    let calendar = parse(&text).unwrap();
    assert_eq!(calendar.uids(), vec!["a"]);
    assert!(calendar.prodid().is_some());
    assert!(!dir.path().join(format!("{CALENDAR_FILE_NAME}~")).exists());
}

// ============================================================================
// Recovery
// ============================================================================

/// ## Summary
/// Garbage in either file yields an empty, usable store.
#[test_log::test(tokio::test)]
async fn corrupt_files_load_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(CALENDAR_FILE_NAME), b"\x89PNG\r\n\x1a\n garbage").unwrap();
    fs::write(dir.path().join(KEY_FILE_NAME), b"{ not json").unwrap();

    let store = open(dir.path(), 10_000);
    assert!(store.get_components().is_empty());
    assert!(store.get_component_ids().is_empty());
    assert!(store.get_timezones().is_empty());

    assert!(store.put_component(event("fresh", None, "")));
    store.backend().flush().unwrap();
    let reopened = open(dir.path(), 10_000);
    assert!(reopened.has_component("fresh", None));
}

/// ## Summary
/// A well-formed file whose root is not a VCALENDAR is treated as missing.
#[test_log::test(tokio::test)]
async fn wrong_root_component_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(CALENDAR_FILE_NAME),
        "BEGIN:VEVENT\r\nUID:stray\r\nEND:VEVENT\r\n",
    )
    .unwrap();

    let store = open(dir.path(), 10_000);
    assert!(!store.has_component("stray", None));
}

// ============================================================================
// Debounce and batching
// ============================================================================

/// ## Summary
/// A burst of mutations produces exactly one write after the quiet period.
#[test_log::test(tokio::test)]
async fn burst_of_puts_is_saved_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 50);

    for i in 0..10 {
        assert!(store.put_component(event(&format!("e{i}"), None, "")));
    }
    assert!(store.backend().pending_save());
    assert_eq!(store.backend().saves(), 0);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.backend().saves(), 1);
    assert!(!store.backend().pending_save());
    assert!(!store.backend().is_dirty());

    let text = fs::read_to_string(dir.path().join(CALENDAR_FILE_NAME)).unwrap();
    assert_eq!(parse(&text).unwrap().uids().len(), 10);
}

/// ## Summary
/// Frozen mutations are never written until the thaw, which writes once.
#[test_log::test(tokio::test)]
async fn freeze_batches_into_single_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 30);

    store.freeze_changes();
    for i in 0..5 {
        assert!(store.put_component(event(&format!("e{i}"), None, "")));
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.backend().saves(), 0);
    assert!(!dir.path().join(CALENDAR_FILE_NAME).exists());

    store.thaw_changes();
    assert_eq!(store.backend().saves(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.backend().saves(), 1);

    let text = fs::read_to_string(dir.path().join(CALENDAR_FILE_NAME)).unwrap();
    assert_eq!(parse(&text).unwrap().uids().len(), 5);
}

/// ## Summary
/// Nested freezes only write on the outermost thaw.
#[test_log::test(tokio::test)]
async fn nested_freeze_writes_on_outer_thaw() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 30);

    store.freeze_changes();
    store.freeze_changes();
    assert!(store.put_component(event("a", None, "")));
    store.thaw_changes();
    assert_eq!(store.backend().saves(), 0);
    store.thaw_changes();
    assert_eq!(store.backend().saves(), 1);
}

/// ## Summary
/// Dropping a store with a pending save writes it before teardown.
#[test_log::test(tokio::test)]
async fn drop_flushes_pending_changes() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path(), 60_000);
        assert!(store.put_component(event("late", None, "")));
        assert!(store.backend().pending_save());
    }

    let store = open(dir.path(), 60_000);
    assert!(store.has_component("late", None));
}
