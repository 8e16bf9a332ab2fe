//! Line-oriented command surface
//!
//! One command per line, words separated by whitespace:
//!
//! ```text
//! play [index]          pause            toggle
//! skip                  previous         rewind
//! seek <ms>             shuffle [on|off] repeat [off|all|one]
//! play-playlist <file> [shuffle]
//! remove <index>        move <from> <to> clear
//! ducking on|off        noisy            status
//! pending-quit          stop             quit
//! ```

use crate::error::{DaemonError, Result};
use gramophone_core::Track;
use gramophone_playback::{RepeatMode, SessionCommand, ShuffleMode};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// A parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum DaemonCommand {
    /// Forwarded to the session as is
    Session(SessionCommand),

    /// Read a playlist file and play it
    PlayPlaylist { path: PathBuf, shuffle: bool },

    /// Write the ducking preference
    SetDucking(bool),

    /// Print a session snapshot
    Status,
}

/// Parse one input line; blank lines and `#` comments yield `None`
pub fn parse(line: &str) -> Result<Option<DaemonCommand>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    if name.starts_with('#') {
        return Ok(None);
    }
    let args: Vec<&str> = words.collect();

    let session =
        |command: SessionCommand| -> Result<Option<DaemonCommand>> { Ok(Some(DaemonCommand::Session(command))) };

    match (name, args.as_slice()) {
        ("play", []) => session(SessionCommand::Play),
        ("play", [index]) => session(SessionCommand::PlayAt(index_arg(index)?)),
        ("pause", []) => session(SessionCommand::Pause),
        ("toggle", []) => session(SessionCommand::Toggle),
        ("skip", []) => session(SessionCommand::Skip { force: true }),
        ("previous", []) => session(SessionCommand::Previous { force: true }),
        ("rewind", []) => session(SessionCommand::Back { force: true }),
        ("seek", [ms]) => {
            let ms = ms
                .parse::<u64>()
                .map_err(|_| invalid(format!("seek position {ms:?} is not a number of milliseconds")))?;
            session(SessionCommand::Seek(Duration::from_millis(ms)))
        }
        ("shuffle", []) => session(SessionCommand::ToggleShuffle),
        ("shuffle", [mode]) => session(SessionCommand::SetShuffle(shuffle_arg(mode)?)),
        ("repeat", []) => session(SessionCommand::CycleRepeat),
        ("repeat", [mode]) => session(SessionCommand::SetRepeat(repeat_arg(mode)?)),
        ("play-playlist", [path]) => Ok(Some(DaemonCommand::PlayPlaylist {
            path: PathBuf::from(path),
            shuffle: false,
        })),
        ("play-playlist", [path, "shuffle"]) => Ok(Some(DaemonCommand::PlayPlaylist {
            path: PathBuf::from(path),
            shuffle: true,
        })),
        ("remove", [index]) => session(SessionCommand::RemoveTrack(index_arg(index)?)),
        ("move", [from, to]) => session(SessionCommand::MoveTrack {
            from: index_arg(from)?,
            to: index_arg(to)?,
        }),
        ("clear", []) => session(SessionCommand::ClearQueue),
        ("ducking", [flag]) => Ok(Some(DaemonCommand::SetDucking(on_off(flag)?))),
        ("noisy", []) => session(SessionCommand::BecomingNoisy),
        ("status", []) => Ok(Some(DaemonCommand::Status)),
        ("pending-quit", []) => session(SessionCommand::PendingQuit),
        ("stop" | "quit", []) => session(SessionCommand::Quit),
        _ => Err(invalid(line.trim().to_string())),
    }
}

fn invalid(msg: impl Into<String>) -> DaemonError {
    DaemonError::InvalidCommand(msg.into())
}

fn index_arg(word: &str) -> Result<usize> {
    word.parse()
        .map_err(|_| invalid(format!("{word:?} is not a queue index")))
}

fn on_off(word: &str) -> Result<bool> {
    match word {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(invalid(format!("expected on or off, got {word:?}"))),
    }
}

fn shuffle_arg(word: &str) -> Result<ShuffleMode> {
    word.parse()
        .map_err(|_| invalid(format!("expected on or off, got {word:?}")))
}

fn repeat_arg(word: &str) -> Result<RepeatMode> {
    word.parse()
        .map_err(|_| invalid(format!("expected off, all or one, got {word:?}")))
}

/// One entry of a playlist file
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub artwork: Option<String>,
    pub uri: String,
}

impl From<PlaylistEntry> for Track {
    fn from(entry: PlaylistEntry) -> Self {
        let mut track = Track::new(entry.title, entry.uri);
        if let Some(id) = entry.id {
            track = track.with_id(id);
        }
        track.artist = entry.artist;
        track.album = entry.album;
        track.duration = entry.duration_ms.map(Duration::from_millis);
        track.year = entry.year;
        track.artwork = entry.artwork;
        track
    }
}

/// Parse a playlist file: a JSON array of entries
pub fn parse_playlist(json: &str) -> Result<Vec<Track>> {
    let entries: Vec<PlaylistEntry> = serde_json::from_str(json)?;
    Ok(entries.into_iter().map(Track::from).collect())
}
