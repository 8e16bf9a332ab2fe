//! Gramophone Server Client
//!
//! HTTP client that reports playback to a remote media server: start,
//! periodic progress, stop, and "played" marks. It implements
//! [`gramophone_core::PlaybackReporter`] so the playback session can use it
//! directly.
//!
//! # Example
//!
//! ```ignore
//! use gramophone_server_client::{MediaServerClient, ServerConfig};
//! use std::sync::Arc;
//!
//! let config = ServerConfig::with_credentials("https://media.example.com", "token", "user-id");
//! let reporter = Arc::new(MediaServerClient::new(config)?);
//! let session = SessionBuilder::new(engine, events, store.clone(), store)
//!     .reporter(reporter)
//!     .spawn()
//!     .await;
//! ```

mod client;
mod error;
mod types;

pub use client::{MediaServerClient, TOKEN_HEADER};
pub use error::{Result, ServerClientError};
pub use types::ServerConfig;
