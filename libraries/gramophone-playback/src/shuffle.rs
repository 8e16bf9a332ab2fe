//! Shuffle anchored at a start position
//!
//! Produces a uniformly random order of the remaining tracks while pinning
//! one chosen track to the front, so the track the listener picked keeps
//! playing and becomes cursor 0 of the shuffled queue.

use gramophone_core::Track;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Shuffle `tracks` in place, moving `anchor` (if any) to index 0
///
/// An anchor outside the slice is ignored and the whole slice is shuffled.
pub fn shuffle_anchored(tracks: &mut Vec<Track>, anchor: Option<usize>) {
    shuffle_anchored_with(tracks, anchor, &mut thread_rng());
}

/// Same as [`shuffle_anchored`] with a caller-supplied RNG
pub fn shuffle_anchored_with<R: Rng + ?Sized>(
    tracks: &mut Vec<Track>,
    anchor: Option<usize>,
    rng: &mut R,
) {
    match anchor.filter(|&index| index < tracks.len()) {
        Some(index) => {
            let pinned = tracks.remove(index);
            tracks.shuffle(rng);
            tracks.insert(0, pinned);
        }
        None => tracks.shuffle(rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(format!("Track {i}"), format!("/music/{i}.flac")).with_id(format!("{i}")))
            .collect()
    }

    fn sorted_ids(tracks: &[Track]) -> Vec<String> {
        let mut ids: Vec<String> = tracks.iter().map(|t| t.id.to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn anchor_moves_to_front() {
        let original = tracks(20);
        for anchor in [0, 7, 19] {
            let mut shuffled = original.clone();
            shuffle_anchored(&mut shuffled, Some(anchor));
            assert_eq!(shuffled[0], original[anchor]);
            assert_eq!(sorted_ids(&shuffled), sorted_ids(&original));
        }
    }

    #[test]
    fn without_anchor_keeps_all_tracks() {
        let original = tracks(10);
        let mut shuffled = original.clone();
        shuffle_anchored(&mut shuffled, None);
        assert_eq!(shuffled.len(), 10);
        assert_eq!(sorted_ids(&shuffled), sorted_ids(&original));
    }

    #[test]
    fn out_of_range_anchor_is_ignored() {
        let mut shuffled = tracks(3);
        shuffle_anchored(&mut shuffled, Some(3));
        assert_eq!(shuffled.len(), 3);
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let mut a = tracks(12);
        let mut b = tracks(12);
        shuffle_anchored_with(&mut a, Some(4), &mut StdRng::seed_from_u64(7));
        shuffle_anchored_with(&mut b, Some(4), &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_and_single() {
        let mut empty: Vec<Track> = Vec::new();
        shuffle_anchored(&mut empty, Some(0));
        assert!(empty.is_empty());

        let mut single = tracks(1);
        shuffle_anchored(&mut single, Some(0));
        assert_eq!(single.len(), 1);
    }
}
