//! Gramophone daemon
//!
//! Wires the playback session to `SQLite` storage, an optional remote media
//! server, and a line-oriented command surface on stdin.

pub mod commands;
pub mod config;
pub mod error;

pub use error::{DaemonError, Result};
