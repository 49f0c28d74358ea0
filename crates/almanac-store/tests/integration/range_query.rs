//! Tests for time-range queries through the occurrence index.

use almanac_store::{ComponentStore, Timezone};

use super::helpers::*;

/// ## Summary
/// An indexed event is found by overlapping windows only.
#[test_log::test(tokio::test)]
async fn event_found_only_in_overlapping_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);

    assert!(store.put_component_with_time_range(
        event("a", None, "DTSTART:20240101T000000Z\r\nDTEND:20240102T000000Z\r\n"),
        utc(2024, 1, 1, 0, 0),
        utc(2024, 1, 2, 0, 0),
    ));

    let hits = store.get_components_occurring_in_range(utc(2024, 1, 1, 0, 0), utc(2024, 1, 1, 12, 0));
    assert_eq!(uids(&hits), vec!["a"]);

    let misses =
        store.get_components_occurring_in_range(utc(2024, 1, 3, 0, 0), utc(2024, 1, 4, 0, 0));
    assert!(misses.is_empty());
}

/// ## Summary
/// Removing a component also drops it from range results.
#[test_log::test(tokio::test)]
async fn removed_component_leaves_index() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);

    assert!(store.put_component_with_time_range(
        event("a", None, ""),
        utc(2024, 1, 1, 0, 0),
        utc(2024, 1, 2, 0, 0),
    ));
    assert!(store.put_component_with_time_range(
        event("b", None, ""),
        utc(2024, 1, 1, 6, 0),
        utc(2024, 1, 1, 7, 0),
    ));
    assert!(store.remove_component("a", None));

    let hits = store.get_components_occurring_in_range(utc(2024, 1, 1, 0, 0), utc(2024, 1, 1, 12, 0));
    assert_eq!(uids(&hits), vec!["b"]);
}

/// ## Summary
/// Re-putting with a new range moves the component in the index.
#[test_log::test(tokio::test)]
async fn reput_replaces_indexed_range() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);

    assert!(store.put_component_with_time_range(
        event("a", None, ""),
        utc(2024, 1, 1, 0, 0),
        utc(2024, 1, 1, 1, 0),
    ));
    assert!(store.put_component_with_time_range(
        event("a", None, ""),
        utc(2024, 6, 1, 0, 0),
        utc(2024, 6, 1, 1, 0),
    ));

    assert_eq!(store.indexed_len(), 1);
    assert!(
        store
            .get_components_occurring_in_range(utc(2024, 1, 1, 0, 0), utc(2024, 1, 2, 0, 0))
            .is_empty()
    );
    assert_eq!(
        store
            .get_components_occurring_in_range(utc(2024, 6, 1, 0, 30), utc(2024, 6, 1, 0, 45))
            .len(),
        1
    );
}

/// ## Summary
/// Loading a saved store indexes every component by its occurrences.
#[test_log::test(tokio::test)]
async fn load_indexes_saved_components() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path(), 10_000);
        assert!(store.put_component(event(
            "meeting",
            None,
            "DTSTART:20240101T090000Z\r\nDTEND:20240101T100000Z\r\n",
        )));
        assert!(store.put_component(event(
            "weekly",
            None,
            "DTSTART:20240101T120000Z\r\nDURATION:PT1H\r\nRRULE:FREQ=WEEKLY;COUNT=4\r\n",
        )));
        assert!(store.put_component(event(
            "forever",
            None,
            "DTSTART:20240101T080000Z\r\nRRULE:FREQ=DAILY\r\n",
        )));
        assert!(store.put_timezone(&Timezone::fixed("Custom/Zone", 0)));
        assert_eq!(store.indexed_len(), 0);
        store.backend().flush().unwrap();
    }

    let store = open(dir.path(), 10_000);
    assert_eq!(store.indexed_len(), 3);

    let jan_1 = store.get_components_occurring_in_range(utc(2024, 1, 1, 9, 30), utc(2024, 1, 1, 9, 45));
    assert_eq!(uids(&jan_1), vec!["forever", "meeting"]);

    let jan_20 = store.get_components_occurring_in_range(utc(2024, 1, 20, 0, 0), utc(2024, 1, 21, 0, 0));
    assert_eq!(uids(&jan_20), vec!["forever", "weekly"]);

    let far = store.get_components_occurring_in_range(utc(2030, 1, 1, 0, 0), utc(2030, 1, 2, 0, 0));
    assert_eq!(uids(&far), vec!["forever"]);
}

/// ## Summary
/// A zoned weekly series that crosses the end of summer time is indexed up
/// to the end of its last local-time instance.
#[test_log::test(tokio::test)]
async fn zoned_series_indexed_through_dst_change() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path(), 10_000);
        assert!(store.put_component(event(
            "weekly-prague",
            None,
            "DTSTART;TZID=Europe/Prague:20240701T100000\r\n\
DTEND;TZID=Europe/Prague:20240701T110000\r\n\
RRULE:FREQ=WEEKLY;COUNT=26\r\n",
        )));
        store.backend().flush().unwrap();
    }

    let store = open(dir.path(), 10_000);
    // The last instance is 10:00-11:00 CET, 09:00-10:00 UTC.
    let tail = store.get_components_occurring_in_range(utc(2024, 12, 23, 9, 30), utc(2024, 12, 23, 9, 45));
    assert_eq!(uids(&tail), vec!["weekly-prague"]);

    let after = store.get_components_occurring_in_range(utc(2024, 12, 23, 10, 30), utc(2024, 12, 24, 0, 0));
    assert!(after.is_empty());
}

/// ## Summary
/// Floating times are indexed in the default timezone after a reload.
#[test_log::test(tokio::test)]
async fn floating_times_use_default_timezone_on_load() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path(), 10_000);
        assert!(store.set_default_timezone(&Timezone::fixed("Custom/Office", 2 * 3600)));
        assert!(store.put_component(event(
            "standup",
            None,
            "DTSTART:20240101T100000\r\nDURATION:PT15M\r\n",
        )));
        store.backend().flush().unwrap();
    }

    let store = open(dir.path(), 10_000);
    let office = store.get_components_occurring_in_range(utc(2024, 1, 1, 8, 5), utc(2024, 1, 1, 8, 10));
    assert_eq!(uids(&office), vec!["standup"]);

    let as_utc = store.get_components_occurring_in_range(utc(2024, 1, 1, 9, 30), utc(2024, 1, 1, 10, 30));
    assert!(as_utc.is_empty());
}

/// ## Summary
/// The overlap test includes both window edges.
#[test_log::test(tokio::test)]
async fn window_edges_are_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), 10_000);
    assert!(store.put_component_with_time_range(
        event("edge", None, ""),
        utc(2024, 1, 1, 10, 0),
        utc(2024, 1, 1, 11, 0),
    ));

    let touching_end = store.get_components_occurring_in_range(utc(2024, 1, 1, 11, 0), utc(2024, 1, 1, 12, 0));
    assert_eq!(touching_end.len(), 1);
    let touching_start = store.get_components_occurring_in_range(utc(2024, 1, 1, 9, 0), utc(2024, 1, 1, 10, 0));
    assert_eq!(touching_start.len(), 1);
}
