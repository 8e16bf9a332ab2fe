//! Dual-order playing queue
//!
//! The queue keeps the tracks twice:
//! - Original order: the order the queue was opened with, plus insertions
//! - Effective order: what actually plays; equal to the original order unless
//!   shuffle is on, in which case it is a permutation of it
//!
//! Both orders always hold the same multiset of tracks. The cursor indexes
//! the effective order; `None` means no current track.
//!
//! ```text
//! original:  A B C D
//! effective: C A D B      (shuffle on, opened at C)
//! cursor:    0 ──► C
//! ```

use crate::error::{PlaybackError, Result};
use crate::shuffle::shuffle_anchored;
use crate::types::{RepeatMode, ShuffleMode};
use gramophone_core::Track;

/// Next position after `cursor` in a queue of `len` tracks
///
/// Returns `None` only for an empty queue. With no cursor the queue starts
/// from the top.
pub fn next_position(
    cursor: Option<usize>,
    len: usize,
    repeat: RepeatMode,
    force: bool,
) -> Option<usize> {
    let last = len.checked_sub(1)?;
    let Some(cursor) = cursor.map(|c| c.min(last)) else {
        return Some(0);
    };

    let position = match (repeat, force) {
        (RepeatMode::All, _) | (RepeatMode::One, true) => {
            if cursor == last {
                0
            } else {
                cursor + 1
            }
        }
        (RepeatMode::One, false) => cursor,
        (RepeatMode::Off, _) => (cursor + 1).min(last),
    };
    Some(position)
}

/// Previous position before `cursor` in a queue of `len` tracks
pub fn previous_position(
    cursor: Option<usize>,
    len: usize,
    repeat: RepeatMode,
    force: bool,
) -> Option<usize> {
    let last = len.checked_sub(1)?;
    let Some(cursor) = cursor.map(|c| c.min(last)) else {
        return Some(0);
    };

    let position = match (repeat, force) {
        (RepeatMode::All, _) | (RepeatMode::One, true) => cursor.checked_sub(1).unwrap_or(last),
        (RepeatMode::One, false) => cursor,
        (RepeatMode::Off, _) => cursor.saturating_sub(1),
    };
    Some(position)
}

/// Outcome of removing a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// The track taken out of the effective order
    pub track: Track,

    /// The removed track was the current one, so the cursor now names a different track
    pub was_current: bool,
}

/// Playing queue with original and effective orders
#[derive(Debug, Clone, Default)]
pub struct PlayingQueue {
    /// Order actually played
    playing: Vec<Track>,

    /// Order before shuffle (for restoring)
    original: Vec<Track>,

    /// Index into `playing`
    cursor: Option<usize>,

    shuffle: ShuffleMode,
}

impl PlayingQueue {
    /// Create new empty queue
    pub fn new(shuffle: ShuffleMode) -> Self {
        Self {
            shuffle,
            ..Self::default()
        }
    }

    /// Effective order
    pub fn tracks(&self) -> &[Track] {
        &self.playing
    }

    /// Original order
    pub fn original_tracks(&self) -> &[Track] {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.playing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playing.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn shuffle_mode(&self) -> ShuffleMode {
        self.shuffle
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.playing.get(index)
    }

    /// Track under the cursor
    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|c| self.playing.get(c))
    }

    pub fn is_last_track(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 == self.playing.len())
    }

    pub fn next_position(&self, repeat: RepeatMode, force: bool) -> Option<usize> {
        next_position(self.cursor, self.playing.len(), repeat, force)
    }

    pub fn previous_position(&self, repeat: RepeatMode, force: bool) -> Option<usize> {
        previous_position(self.cursor, self.playing.len(), repeat, force)
    }

    /// Point the cursor at `index`
    pub fn select(&mut self, index: usize) -> Result<&Track> {
        self.check_index(index)?;
        self.cursor = Some(index);
        Ok(&self.playing[index])
    }

    /// Replace both orders with `tracks`
    ///
    /// With shuffle on the effective order is shuffled with the start track
    /// pinned at index 0. Returns the new cursor.
    pub fn open(&mut self, tracks: Vec<Track>, start: usize) -> Result<usize> {
        if tracks.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if start >= tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds {
                index: start,
                len: tracks.len(),
            });
        }

        self.original.clone_from(&tracks);
        self.playing = tracks;

        let cursor = if self.shuffle.is_on() {
            shuffle_anchored(&mut self.playing, Some(start));
            0
        } else {
            start
        };
        self.cursor = Some(cursor);
        Ok(cursor)
    }

    /// Append tracks to both orders
    pub fn append(&mut self, tracks: Vec<Track>) {
        self.original.extend(tracks.iter().cloned());
        self.playing.extend(tracks);
    }

    /// Insert tracks at `index` in both orders
    ///
    /// `index == len` appends. The cursor keeps pointing at the same track.
    pub fn insert(&mut self, index: usize, tracks: Vec<Track>) -> Result<()> {
        if index > self.playing.len() {
            return Err(PlaybackError::IndexOutOfBounds {
                index,
                len: self.playing.len(),
            });
        }

        let count = tracks.len();
        let original_index = index.min(self.original.len());
        self.original
            .splice(original_index..original_index, tracks.iter().cloned());
        self.playing.splice(index..index, tracks);

        if let Some(cursor) = self.cursor {
            if index <= cursor {
                self.cursor = Some(cursor + count);
            }
        }
        Ok(())
    }

    /// Remove the track at `index` of the effective order
    pub fn remove(&mut self, index: usize) -> Result<Removal> {
        self.check_index(index)?;

        let track = self.playing.remove(index);
        if self.shuffle.is_on() {
            // Indexes differ between orders; drop the same track value instead
            if let Some(pos) = self.original.iter().position(|t| *t == track) {
                self.original.remove(pos);
            }
        } else {
            self.original.remove(index);
        }

        let was_current = self.cursor == Some(index);
        self.cursor = match self.cursor {
            Some(cursor) if index < cursor => Some(cursor - 1),
            Some(cursor) if index == cursor => {
                if index < self.playing.len() {
                    Some(cursor)
                } else {
                    cursor.checked_sub(1)
                }
            }
            other => other,
        };

        Ok(Removal { track, was_current })
    }

    /// Move a track within the effective order
    ///
    /// Mirrored into the original order only while shuffle is off.
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let track = self.playing.remove(from);
        self.playing.insert(to, track);
        if !self.shuffle.is_on() {
            let track = self.original.remove(from);
            self.original.insert(to, track);
        }

        if let Some(cursor) = self.cursor {
            self.cursor = Some(if from == cursor {
                to
            } else if from > cursor && cursor >= to {
                cursor + 1
            } else if from < cursor && cursor <= to {
                cursor - 1
            } else {
                cursor
            });
        }
        Ok(())
    }

    /// Empty both orders and drop the cursor
    pub fn clear(&mut self) {
        self.playing.clear();
        self.original.clear();
        self.cursor = None;
    }

    /// Switch shuffle on or off
    ///
    /// On: the effective order is reshuffled with the current track pinned at
    /// index 0. Off: the effective order is rebuilt from the original order and
    /// the cursor follows the current track by id (first match, else 0).
    pub fn set_shuffle(&mut self, mode: ShuffleMode) {
        self.shuffle = mode;
        if self.playing.is_empty() {
            return;
        }

        match mode {
            ShuffleMode::On => {
                shuffle_anchored(&mut self.playing, self.cursor);
                if self.cursor.is_some() {
                    self.cursor = Some(0);
                }
            }
            ShuffleMode::Off => {
                let current_id = self.current().map(|t| t.id.clone());
                self.playing.clone_from(&self.original);
                if let Some(id) = current_id {
                    let index = self.playing.iter().position(|t| t.id == id).unwrap_or(0);
                    self.cursor = Some(index);
                }
            }
        }
    }

    /// Apply a saved queue
    ///
    /// The saved state must be complete: both orders non-empty and of equal
    /// length, and the cursor inside them. Nothing is changed otherwise.
    pub fn restore(
        &mut self,
        playing: Vec<Track>,
        original: Vec<Track>,
        cursor: usize,
    ) -> Result<()> {
        if playing.is_empty() {
            return Err(PlaybackError::InvalidRestore("no saved queue".into()));
        }
        if playing.len() != original.len() {
            return Err(PlaybackError::InvalidRestore(format!(
                "order lengths differ ({} vs {})",
                playing.len(),
                original.len()
            )));
        }
        if cursor >= playing.len() {
            return Err(PlaybackError::InvalidRestore(format!(
                "cursor {cursor} outside queue of {}",
                playing.len()
            )));
        }

        self.playing = playing;
        self.original = original;
        self.cursor = Some(cursor);
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.playing.len() {
            Ok(())
        } else {
            Err(PlaybackError::IndexOutOfBounds {
                index,
                len: self.playing.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(format!("Track {id}"), format!("/music/{id}.mp3")).with_id(id)
    }

    fn abcd() -> Vec<Track> {
        ["A", "B", "C", "D"].into_iter().map(track).collect()
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    fn opened(start: usize) -> PlayingQueue {
        let mut queue = PlayingQueue::new(ShuffleMode::Off);
        queue.open(abcd(), start).unwrap();
        queue
    }

    #[test]
    fn create_empty_queue() {
        let queue = PlayingQueue::default();
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
        assert!(queue.current().is_none());
        assert_eq!(queue.next_position(RepeatMode::All, false), None);
    }

    #[test]
    fn open_rejects_bad_arguments() {
        let mut queue = PlayingQueue::default();
        assert_eq!(queue.open(Vec::new(), 0), Err(PlaybackError::QueueEmpty));
        assert!(queue.open(abcd(), 4).is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn open_with_shuffle_pins_start_track() {
        let mut queue = PlayingQueue::new(ShuffleMode::On);
        assert_eq!(queue.open(abcd(), 2).unwrap(), 0);
        assert_eq!(queue.current().unwrap().id.as_str(), "C");
        assert_eq!(ids(queue.original_tracks()), ["A", "B", "C", "D"]);
    }

    #[test]
    fn next_position_with_repeat_off_clamps() {
        assert_eq!(next_position(Some(1), 4, RepeatMode::Off, false), Some(2));
        assert_eq!(next_position(Some(3), 4, RepeatMode::Off, false), Some(3));
        assert_eq!(next_position(Some(3), 4, RepeatMode::Off, true), Some(3));
    }

    #[test]
    fn next_position_with_repeat_one() {
        assert_eq!(next_position(Some(1), 4, RepeatMode::One, false), Some(1));
        assert_eq!(next_position(Some(1), 4, RepeatMode::One, true), Some(2));
        assert_eq!(next_position(Some(3), 4, RepeatMode::One, true), Some(0));
    }

    #[test]
    fn next_position_with_repeat_all_wraps() {
        assert_eq!(next_position(Some(3), 4, RepeatMode::All, false), Some(0));
        assert_eq!(next_position(None, 4, RepeatMode::All, false), Some(0));
    }

    #[test]
    fn previous_position_rules() {
        assert_eq!(previous_position(Some(0), 4, RepeatMode::Off, false), Some(0));
        assert_eq!(previous_position(Some(2), 4, RepeatMode::Off, false), Some(1));
        assert_eq!(previous_position(Some(0), 4, RepeatMode::All, false), Some(3));
        assert_eq!(previous_position(Some(2), 4, RepeatMode::One, false), Some(2));
        assert_eq!(previous_position(Some(0), 4, RepeatMode::One, true), Some(3));
    }

    #[test]
    fn insert_before_cursor_keeps_current_track() {
        let mut queue = opened(1);
        queue.insert(0, vec![track("X"), track("Y")]).unwrap();
        assert_eq!(queue.cursor(), Some(3));
        assert_eq!(queue.current().unwrap().id.as_str(), "B");
        assert_eq!(ids(queue.original_tracks()), ["X", "Y", "A", "B", "C", "D"]);
    }

    #[test]
    fn insert_at_end_appends() {
        let mut queue = opened(0);
        queue.insert(4, vec![track("E")]).unwrap();
        assert_eq!(ids(queue.tracks()), ["A", "B", "C", "D", "E"]);
        assert!(queue.insert(6, vec![track("F")]).is_err());
    }

    #[test]
    fn remove_before_cursor_decrements() {
        let mut queue = opened(2);
        let removal = queue.remove(0).unwrap();
        assert!(!removal.was_current);
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().unwrap().id.as_str(), "C");
    }

    #[test]
    fn remove_current_moves_to_following_track() {
        let mut queue = opened(1);
        let removal = queue.remove(1).unwrap();
        assert!(removal.was_current);
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().unwrap().id.as_str(), "C");
    }

    #[test]
    fn remove_current_last_steps_back() {
        let mut queue = opened(3);
        queue.remove(3).unwrap();
        assert_eq!(queue.cursor(), Some(2));
    }

    #[test]
    fn remove_only_track_clears_cursor() {
        let mut queue = PlayingQueue::default();
        queue.open(vec![track("A")], 0).unwrap();
        queue.remove(0).unwrap();
        assert_eq!(queue.cursor(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_while_shuffled_drops_same_track_from_original() {
        let mut queue = PlayingQueue::new(ShuffleMode::On);
        queue.open(abcd(), 0).unwrap();
        let removed = queue.remove(2).unwrap().track;
        assert_eq!(queue.original_tracks().len(), 3);
        assert!(!queue.original_tracks().contains(&removed));
    }

    #[test]
    fn move_rules_follow_current_track() {
        let mut queue = opened(1);
        queue.move_track(3, 0).unwrap();
        assert_eq!(ids(queue.tracks()), ["D", "A", "B", "C"]);
        assert_eq!(queue.current().unwrap().id.as_str(), "B");

        queue.move_track(0, 3).unwrap();
        assert_eq!(queue.current().unwrap().id.as_str(), "B");

        queue.move_track(1, 3).unwrap();
        assert_eq!(queue.cursor(), Some(3));
        assert_eq!(ids(queue.original_tracks()), ids(queue.tracks()));
    }

    #[test]
    fn move_while_shuffled_leaves_original_alone() {
        let mut queue = PlayingQueue::new(ShuffleMode::On);
        queue.open(abcd(), 0).unwrap();
        queue.move_track(0, 3).unwrap();
        assert_eq!(ids(queue.original_tracks()), ["A", "B", "C", "D"]);
        assert_eq!(queue.cursor(), Some(3));
    }

    #[test]
    fn shuffle_round_trip_restores_order_and_track() {
        let mut queue = opened(2);
        queue.set_shuffle(ShuffleMode::On);
        assert_eq!(queue.cursor(), Some(0));
        assert_eq!(queue.current().unwrap().id.as_str(), "C");

        queue.set_shuffle(ShuffleMode::Off);
        assert_eq!(ids(queue.tracks()), ["A", "B", "C", "D"]);
        assert_eq!(queue.cursor(), Some(2));
    }

    #[test]
    fn clear_drops_everything() {
        let mut queue = opened(1);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.original_tracks().is_empty());
        assert_eq!(queue.cursor(), None);
    }

    #[test]
    fn restore_rejects_mismatched_orders() {
        let mut queue = PlayingQueue::default();
        let tracks = abcd();
        let result = queue.restore(tracks[..2].to_vec(), tracks[..3].to_vec(), 0);
        assert!(matches!(result, Err(PlaybackError::InvalidRestore(_))));
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
    }

    #[test]
    fn restore_rejects_cursor_outside_queue() {
        let mut queue = PlayingQueue::default();
        assert!(queue.restore(abcd(), abcd(), 4).is_err());
        assert!(queue.restore(abcd(), abcd(), 3).is_ok());
        assert_eq!(queue.current().unwrap().id.as_str(), "D");
    }
}
