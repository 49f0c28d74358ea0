//! Tests for one store shared between threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use almanac_store::{ComponentId, ComponentStore};

use super::helpers::*;

const WRITERS: usize = 4;
const PER_WRITER: usize = 40;

fn writer_uid(writer: usize, i: usize) -> String {
    format!("w{writer}-{i:03}")
}

/// ## Summary
/// Concurrent range puts, removals and reads leave the backend and the
/// index in agreement, and the result survives a reopen.
#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn writers_and_readers_agree_on_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut expected: Vec<ComponentId> = (0..WRITERS)
        .flat_map(|w| (0..PER_WRITER).filter(|i| i % 2 == 1).map(move |i| (w, i)))
        .map(|(w, i)| ComponentId::master(writer_uid(w, i)))
        .collect();
    expected.sort();

    {
        let store = open(dir.path(), 20);
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            let writers: Vec<_> = (0..WRITERS)
                .map(|w| {
                    let store = &store;
                    scope.spawn(move || {
                        for i in 0..PER_WRITER {
                            let uid = writer_uid(w, i);
                            let day = u32::try_from(i % 28).unwrap() + 1;
                            assert!(store.put_component_with_time_range(
                                event(&uid, None, ""),
                                utc(2024, 1, day, 9, 0),
                                utc(2024, 1, day, 10, 0),
                            ));
                            if i % 2 == 0 {
                                assert!(store.remove_component(&uid, None));
                            }
                        }
                    })
                })
                .collect();

            for _ in 0..2 {
                scope.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        let hits = store.get_components_occurring_in_range(
                            utc(2024, 1, 1, 0, 0),
                            utc(2024, 2, 1, 0, 0),
                        );
                        assert!(hits.iter().all(|c| c.uid().is_some_and(|u| u.starts_with('w'))));
                        for id in store.get_component_ids() {
                            assert!(id.rid().is_none());
                        }
                        thread::yield_now();
                    }
                });
            }

            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        let mut ids = store.get_component_ids();
        ids.sort();
        assert_eq!(ids, expected);
        assert_eq!(store.indexed_len(), expected.len());

        let everything = store
            .get_components_occurring_in_range(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0));
        assert_eq!(everything.len(), expected.len());

        store.backend().flush().unwrap();
    }

    let reopened = open(dir.path(), 10_000);
    let mut ids = reopened.get_component_ids();
    ids.sort();
    assert_eq!(ids, expected);
}
