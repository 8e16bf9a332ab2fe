//! Domain types shared across Gramophone crates

mod ids;
mod modes;
mod report;
mod track;

pub use ids::TrackId;
pub use modes::{RepeatMode, ShuffleMode};
pub use report::{
    ticks, PlaybackProgressInfo, PlaybackStartInfo, PlaybackStopInfo, TICKS_PER_MILLISECOND,
};
pub use track::Track;
