//! Property-based tests for the playing queue
//!
//! Uses proptest to check queue invariants across random inputs.

use gramophone_core::Track;
use gramophone_playback::queue::{next_position, previous_position};
use gramophone_playback::{PlayingQueue, RepeatMode, ShuffleMode};
use proptest::prelude::*;
use std::time::Duration;

// ===== Helpers =====

fn arbitrary_tracks() -> impl Strategy<Value = Vec<Track>> {
    (1usize..40).prop_map(|count| {
        (0..count)
            .map(|n| {
                Track::new(format!("Song {n}"), format!("/music/{n}.ogg"))
                    .with_id(format!("id-{n}"))
                    .with_duration(Duration::from_secs(120))
            })
            .collect()
    })
}

fn repeat_mode() -> impl Strategy<Value = RepeatMode> {
    prop_oneof![
        Just(RepeatMode::Off),
        Just(RepeatMode::All),
        Just(RepeatMode::One)
    ]
}

fn sorted_ids(tracks: &[Track]) -> Vec<String> {
    let mut ids: Vec<String> = tracks.iter().map(|t| t.id.to_string()).collect();
    ids.sort();
    ids
}

#[derive(Debug, Clone)]
enum Edit {
    Remove(usize),
    Move(usize, usize),
    Insert(usize),
    Append,
    Shuffle(bool),
    Select(usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        any::<usize>().prop_map(Edit::Remove),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::Move(a, b)),
        any::<usize>().prop_map(Edit::Insert),
        Just(Edit::Append),
        any::<bool>().prop_map(Edit::Shuffle),
        any::<usize>().prop_map(Edit::Select),
    ]
}

fn apply(queue: &mut PlayingQueue, edit: &Edit, serial: &mut usize) {
    let len = queue.len();
    let mut fresh = || {
        *serial += 1;
        Track::new("Added", format!("/music/added-{serial}.ogg")).with_id(format!("added-{serial}"))
    };
    match *edit {
        Edit::Remove(i) if len > 0 => {
            queue.remove(i % len).unwrap();
        }
        Edit::Move(a, b) if len > 0 => queue.move_track(a % len, b % len).unwrap(),
        Edit::Insert(i) => queue.insert(i % (len + 1), vec![fresh()]).unwrap(),
        Edit::Append => queue.append(vec![fresh()]),
        Edit::Shuffle(on) => queue.set_shuffle(if on { ShuffleMode::On } else { ShuffleMode::Off }),
        Edit::Select(i) if len > 0 => {
            queue.select(i % len).unwrap();
        }
        _ => {}
    }
}

// ===== Property Tests =====

proptest! {
    #[test]
    fn prop_navigation_stays_in_bounds(
        len in 0usize..50,
        cursor in proptest::option::of(0usize..60),
        repeat in repeat_mode(),
        force in any::<bool>(),
    ) {
        let next = next_position(cursor, len, repeat, force);
        let previous = previous_position(cursor, len, repeat, force);

        if len == 0 {
            prop_assert_eq!(next, None);
            prop_assert_eq!(previous, None);
        } else {
            prop_assert!(next.unwrap() < len);
            prop_assert!(previous.unwrap() < len);
        }
    }

    #[test]
    fn prop_repeat_one_without_force_stays(len in 1usize..50, cursor in 0usize..50) {
        let cursor = cursor % len;
        prop_assert_eq!(next_position(Some(cursor), len, RepeatMode::One, false), Some(cursor));
        prop_assert_eq!(previous_position(Some(cursor), len, RepeatMode::One, false), Some(cursor));
    }

    #[test]
    fn prop_repeat_all_cycles_through_every_track(len in 1usize..30, start in 0usize..30) {
        let mut cursor = start % len;
        let mut seen = vec![false; len];
        for _ in 0..len {
            seen[cursor] = true;
            cursor = next_position(Some(cursor), len, RepeatMode::All, false).unwrap();
        }
        prop_assert!(seen.into_iter().all(|s| s));
        prop_assert_eq!(cursor, start % len);
    }

    #[test]
    fn prop_edits_keep_orders_equal_as_multisets(
        tracks in arbitrary_tracks(),
        start in any::<usize>(),
        edits in proptest::collection::vec(edit(), 0..30),
    ) {
        let mut queue = PlayingQueue::new(ShuffleMode::Off);
        let start = start % tracks.len();
        queue.open(tracks, start).unwrap();

        let mut serial = 0;
        for edit in &edits {
            apply(&mut queue, edit, &mut serial);

            prop_assert_eq!(queue.tracks().len(), queue.original_tracks().len());
            prop_assert_eq!(sorted_ids(queue.tracks()), sorted_ids(queue.original_tracks()));
            if let Some(cursor) = queue.cursor() {
                prop_assert!(cursor < queue.len());
            }
        }
    }

    #[test]
    fn prop_move_keeps_current_track(
        tracks in arbitrary_tracks(),
        start in any::<usize>(),
        from in any::<usize>(),
        to in any::<usize>(),
    ) {
        let len = tracks.len();
        let mut queue = PlayingQueue::new(ShuffleMode::Off);
        queue.open(tracks, start % len).unwrap();
        let current = queue.current().unwrap().id.clone();

        queue.move_track(from % len, to % len).unwrap();

        prop_assert_eq!(&queue.current().unwrap().id, &current);
    }

    #[test]
    fn prop_shuffle_round_trip_restores_original(
        tracks in arbitrary_tracks(),
        start in any::<usize>(),
    ) {
        let len = tracks.len();
        let mut queue = PlayingQueue::new(ShuffleMode::Off);
        queue.open(tracks.clone(), start % len).unwrap();
        let current = queue.current().unwrap().id.clone();

        queue.set_shuffle(ShuffleMode::On);
        prop_assert_eq!(queue.cursor(), Some(0));
        prop_assert_eq!(&queue.current().unwrap().id, &current);

        queue.set_shuffle(ShuffleMode::Off);
        prop_assert_eq!(queue.tracks(), tracks.as_slice());
        prop_assert_eq!(&queue.current().unwrap().id, &current);
    }
}
