use crate::{preferences, queue};
use async_trait::async_trait;
use gramophone_core::{error::Result, PreferenceStore, QueueSlot, QueueStore, Track};
use sqlx::SqlitePool;
use tokio::sync::broadcast;

/// A preference write observed through [`SqliteStore::subscribe_changes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceChange {
    pub key: String,
    pub value: i64,
}

/// Queue and preference store backed by `SQLite`
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<PreferenceChange>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { pool, changes }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Receive every preference written through this store after subscribing
    pub fn subscribe_changes(&self) -> broadcast::Receiver<PreferenceChange> {
        self.changes.subscribe()
    }

    /// All stored preferences, ordered by key
    pub async fn preferences(&self) -> Result<Vec<(String, i64)>> {
        Ok(preferences::get_all(&self.pool).await?)
    }
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn delete_tracks(&self) -> Result<()> {
        Ok(queue::delete_tracks(&self.pool).await?)
    }

    async fn insert_tracks(&self, tracks: &[Track]) -> Result<()> {
        Ok(queue::insert_tracks(&self.pool, tracks).await?)
    }

    async fn delete_queue(&self) -> Result<()> {
        Ok(queue::delete_queue(&self.pool).await?)
    }

    async fn set_queue(&self, tracks: &[Track], slot: QueueSlot) -> Result<()> {
        Ok(queue::set_queue(&self.pool, tracks, slot).await?)
    }

    async fn get_queue(&self, slot: QueueSlot) -> Result<Vec<Track>> {
        Ok(queue::get_queue(&self.pool, slot).await?)
    }
}

#[async_trait]
impl PreferenceStore for SqliteStore {
    async fn get_int(&self, key: &str) -> Result<Option<i64>> {
        Ok(preferences::get_int(&self.pool, key).await?)
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<()> {
        preferences::set_int(&self.pool, key, value).await?;
        // No subscribers is fine
        let _ = self.changes.send(PreferenceChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }
}
