//! Queue persistence context
//!
//! A single task that owns all store writes. It first reads back the saved
//! session and posts it to the command context, then applies save requests
//! in arrival order. Queue saves pile up quickly (every queue change, every
//! track change) so a burst is collapsed to its newest snapshot.

use super::command::{Inbound, SavedSession};
use crate::types::{RepeatMode, ShuffleMode};
use gramophone_core::storage::keys;
use gramophone_core::{PreferenceStore, QueueSlot, QueueStore, Track};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug)]
pub(crate) enum PersistenceMessage {
    SaveQueue {
        playing: Vec<Track>,
        original: Vec<Track>,
    },
    SavePosition(Option<usize>),
    SaveProgress(i64),
    SaveShuffle(ShuffleMode),
    SaveRepeat(RepeatMode),
}

pub(crate) struct PersistenceWorker {
    queues: Arc<dyn QueueStore>,
    preferences: Arc<dyn PreferenceStore>,
}

impl PersistenceWorker {
    pub(crate) fn new(queues: Arc<dyn QueueStore>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self {
            queues,
            preferences,
        }
    }

    pub(crate) fn spawn(
        self,
        restore_to: mpsc::UnboundedSender<Inbound>,
        rx: mpsc::UnboundedReceiver<PersistenceMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(restore_to, rx))
    }

    async fn run(
        self,
        restore_to: mpsc::UnboundedSender<Inbound>,
        mut rx: mpsc::UnboundedReceiver<PersistenceMessage>,
    ) {
        let saved = match self.load().await {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!(error = %e, "Failed to read saved session");
                None
            }
        };
        if restore_to.send(Inbound::Restored(saved)).is_err() {
            debug!("Session gone before restore completed");
        }
        drop(restore_to);

        while let Some(first) = rx.recv().await {
            let mut batch = vec![first];
            while let Ok(message) = rx.try_recv() {
                batch.push(message);
            }
            self.apply(batch).await;
        }
        debug!("Persistence context stopped");
    }

    async fn load(&self) -> gramophone_core::Result<SavedSession> {
        Ok(SavedSession {
            playing: self.queues.get_queue(QueueSlot::Playing).await?,
            original: self.queues.get_queue(QueueSlot::Original).await?,
            position: self.preferences.get_int_or(keys::POSITION, -1).await?,
            progress_ms: self.preferences.get_int_or(keys::PROGRESS, -1).await?,
        })
    }

    async fn apply(&self, batch: Vec<PersistenceMessage>) {
        let mut queue = None;
        let mut preferences = BTreeMap::new();

        for message in batch {
            match message {
                PersistenceMessage::SaveQueue { playing, original } => {
                    queue = Some((playing, original));
                }
                PersistenceMessage::SavePosition(position) => {
                    let value = position.and_then(|p| i64::try_from(p).ok()).unwrap_or(-1);
                    preferences.insert(keys::POSITION, value);
                }
                PersistenceMessage::SaveProgress(ms) => {
                    preferences.insert(keys::PROGRESS, ms);
                }
                PersistenceMessage::SaveShuffle(mode) => {
                    preferences.insert(keys::SHUFFLE, mode.code());
                }
                PersistenceMessage::SaveRepeat(mode) => {
                    preferences.insert(keys::REPEAT, mode.code());
                }
            }
        }

        if let Some((playing, original)) = queue {
            if let Err(e) = self.save_queue(&playing, &original).await {
                warn!(error = %e, "Failed to save queue");
            }
        }
        for (key, value) in preferences {
            if let Err(e) = self.preferences.set_int(key, value).await {
                warn!(error = %e, key, "Failed to save preference");
            }
        }
    }

    async fn save_queue(&self, playing: &[Track], original: &[Track]) -> gramophone_core::Result<()> {
        debug!(length = playing.len(), "Saving queue");
        self.queues.delete_tracks().await?;
        self.queues.insert_tracks(playing).await?;
        self.queues.delete_queue().await?;
        self.queues.set_queue(playing, QueueSlot::Playing).await?;
        self.queues.set_queue(original, QueueSlot::Original).await?;
        Ok(())
    }
}
