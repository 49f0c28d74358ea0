//! Tests for the component group invariant and whole-store operations.

use std::fs;

use almanac_core::constants::{CALENDAR_FILE_NAME, DEFAULT_ZONE_KEY, KEY_FILE_NAME};
use almanac_rfc::rfc::ical::parse::parse;
use almanac_store::{ComponentStore, Timezone};

use super::helpers::*;

// ============================================================================
// Component groups
// ============================================================================

/// ## Summary
/// A master and its overrides live and die as one group.
#[test_log::test(tokio::test)]
async fn group_tracks_master_and_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);

    assert!(store.put_component(event("a", None, "")));
    assert!(store.put_component(event("a", Some("r1"), "")));
    assert!(store.put_component(event("a", Some("r2"), "")));

    assert!(store.has_component("a", Some("")));
    assert!(store.has_component("a", None));
    assert!(store.has_component("a", Some("r1")));
    assert!(!store.has_component("a", Some("r3")));
    assert_eq!(store.get_components_by_uid("a").len(), 3);

    assert!(store.remove_component("a", Some("r1")));
    assert!(store.remove_component("a", Some("r2")));
    assert!(store.has_component("a", None));
    assert!(store.remove_component("a", Some("")));

    assert!(!store.has_component("a", None));
    assert!(store.get_component_ids().iter().all(|id| id.uid != "a"));
    assert!(store.get_components_by_uid("a").is_empty());
}

/// ## Summary
/// Lookups of unknown identities report absence, not errors.
#[test_log::test(tokio::test)]
async fn unknown_identities_are_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);

    assert!(store.get_component("nope", None).is_none());
    assert!(!store.remove_component("nope", None));
    assert!(!store.remove_component("nope", Some("r1")));
    assert!(store.get_timezone("Nowhere/Zone").is_none());
    assert!(!store.remove_timezone("Nowhere/Zone"));
    assert!(store.get_default_timezone().is_none());
}

/// ## Summary
/// Stored timezones are copies, replaced by TZID.
#[test_log::test(tokio::test)]
async fn timezones_are_replaced_by_tzid() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);

    let mut zone = Timezone::fixed("Custom/Shift", 3600);
    assert!(store.put_timezone(&zone));
    zone = Timezone::fixed("Custom/Shift", 7200);
    assert!(store.put_timezone(&zone));

    assert_eq!(store.get_timezones().len(), 1);
    let stored = store.get_timezone("Custom/Shift").unwrap();
    assert_eq!(stored.utc_offset().unwrap().local_minus_utc(), 7200);

    assert!(store.remove_timezone("Custom/Shift"));
    assert!(store.get_timezone("Custom/Shift").is_none());
}

// ============================================================================
// Key-value entries
// ============================================================================

/// ## Summary
/// Key-value entries persist independently of the calendar file.
#[test_log::test(tokio::test)]
async fn key_values_persist_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path(), 10_000);
        assert!(store.put_key_value("sync-marker", Some("42")));
        assert!(store.put_key_value("server-time", Some("20240101T000000Z")));
        assert!(store.put_key_value("server-time", None));
    }

    let store = open(dir.path(), 10_000);
    assert_eq!(store.get_key_value("sync-marker").as_deref(), Some("42"));
    assert_eq!(store.get_key_value("server-time"), None);
}

/// ## Summary
/// The default timezone is stored by id and resolved through the timezones.
#[test_log::test(tokio::test)]
async fn default_timezone_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path(), 10_000);
        assert!(store.set_default_timezone(&Timezone::fixed("Custom/Home", -3 * 3600)));
    }

    let store = open(dir.path(), 10_000);
    assert_eq!(store.get_key_value(DEFAULT_ZONE_KEY).as_deref(), Some("Custom/Home"));
    let default = store.get_default_timezone().unwrap();
    assert_eq!(default.tzid(), "Custom/Home");

    assert!(store.remove_timezone("Custom/Home"));
    assert!(store.get_default_timezone().is_none());
}

// ============================================================================
// Clean and remove
// ============================================================================

/// ## Summary
/// Cleaning empties memory, keys and the file but keeps the store usable.
#[test_log::test(tokio::test)]
async fn clean_empties_store_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);

    assert!(store.put_component_with_time_range(
        event("a", None, ""),
        utc(2024, 1, 1, 0, 0),
        utc(2024, 1, 2, 0, 0),
    ));
    assert!(store.put_timezone(&Timezone::fixed("Custom/Zone", 0)));
    assert!(store.put_key_value("k", Some("v")));

    assert!(store.clean());
    assert!(store.get_components().is_empty());
    assert!(store.get_timezones().is_empty());
    assert_eq!(store.get_key_value("k"), None);
    assert_eq!(store.indexed_len(), 0);
    assert!(!store.backend().pending_save());

    let text = fs::read_to_string(dir.path().join(CALENDAR_FILE_NAME)).unwrap();
    assert!(parse(&text).unwrap().components().is_empty());

    assert!(store.put_component(event("b", None, "")));
    assert!(store.has_component("b", None));
}

/// ## Summary
/// Removing deletes the files and the emptied directory.
#[test_log::test(tokio::test)]
async fn remove_deletes_backing_files() {
    let parent = tempfile::tempdir().unwrap();
    let dir = parent.path().join("source");
    let store = open(&dir, 10_000);

    assert!(store.put_component_with_time_range(
        event("a", None, ""),
        utc(2024, 1, 1, 0, 0),
        utc(2024, 1, 2, 0, 0),
    ));
    assert!(store.put_key_value("k", Some("v")));
    store.backend().flush().unwrap();
    assert!(dir.join(CALENDAR_FILE_NAME).exists());

    assert!(store.remove());
    assert!(!dir.join(CALENDAR_FILE_NAME).exists());
    assert!(!dir.join(KEY_FILE_NAME).exists());
    assert!(!dir.exists());
    assert!(!store.has_component("a", None));
    assert_eq!(store.indexed_len(), 0);

    drop(store);
    assert!(!dir.exists());
}
