/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A playable track
///
/// Immutable once loaded. Queue snapshots own their tracks by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: Option<String>,

    /// Album name
    pub album: Option<String>,

    /// Track duration, if known before decoding
    pub duration: Option<Duration>,

    /// Release year
    pub year: Option<u32>,

    /// Artwork reference (image tag or URL)
    pub artwork: Option<String>,

    /// Location of the media: a file path or an http(s) stream URL
    pub uri: String,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: TrackId::generate(),
            title: title.into(),
            artist: None,
            album: None,
            duration: None,
            year: None,
            artwork: None,
            uri: uri.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<TrackId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    /// Whether the media is fetched over HTTP(S)
    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }
}
