//! Saved queue storage
//!
//! Track metadata lives in `queue_tracks`; each of the two queue orders is a
//! list of `(slot, position, track_id)` rows in `queue_entries`. Writing a
//! queue order requires its tracks to be inserted first.

use crate::error::{Result, StorageError};
use gramophone_core::{QueueSlot, Track, TrackId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

/// Remove every stored track, and with them both queue orders
pub async fn delete_tracks(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM queue_tracks").execute(pool).await?;
    Ok(())
}

/// Store track metadata, updating tracks already present
pub async fn insert_tracks(pool: &SqlitePool, tracks: &[Track]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for track in tracks {
        let duration_ms = track
            .duration
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));

        sqlx::query(
            "INSERT INTO queue_tracks (id, title, artist, album, duration_ms, year, artwork, uri)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration_ms = excluded.duration_ms,
                year = excluded.year,
                artwork = excluded.artwork,
                uri = excluded.uri",
        )
        .bind(track.id.as_str())
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(duration_ms)
        .bind(track.year.map(i64::from))
        .bind(&track.artwork)
        .bind(&track.uri)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Remove both queue orders, keeping track metadata
pub async fn delete_queue(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM queue_entries").execute(pool).await?;
    Ok(())
}

/// Replace one queue order with `tracks`
pub async fn set_queue(pool: &SqlitePool, tracks: &[Track], slot: QueueSlot) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM queue_entries WHERE slot = ?")
        .bind(slot.code())
        .execute(&mut *tx)
        .await?;

    for (position, track) in tracks.iter().enumerate() {
        sqlx::query("INSERT INTO queue_entries (slot, position, track_id) VALUES (?, ?, ?)")
            .bind(slot.code())
            .bind(position as i64)
            .bind(track.id.as_str())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load one queue order; empty when nothing was saved
pub async fn get_queue(pool: &SqlitePool, slot: QueueSlot) -> Result<Vec<Track>> {
    let rows = sqlx::query(
        "SELECT t.id, t.title, t.artist, t.album, t.duration_ms, t.year, t.artwork, t.uri
         FROM queue_entries e
         JOIN queue_tracks t ON t.id = e.track_id
         WHERE e.slot = ?
         ORDER BY e.position",
    )
    .bind(slot.code())
    .fetch_all(pool)
    .await?;

    rows.iter().map(track_from_row).collect()
}

/// Number of stored tracks
pub async fn count_tracks(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM queue_tracks")
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

fn track_from_row(row: &SqliteRow) -> Result<Track> {
    let id: String = row.get("id");

    let duration = row
        .get::<Option<i64>, _>("duration_ms")
        .map(|ms| {
            u64::try_from(ms)
                .map(Duration::from_millis)
                .map_err(|_| StorageError::corrupt("queue track", format!("{id}: duration {ms}")))
        })
        .transpose()?;

    let year = row
        .get::<Option<i64>, _>("year")
        .map(|year| {
            u32::try_from(year)
                .map_err(|_| StorageError::corrupt("queue track", format!("{id}: year {year}")))
        })
        .transpose()?;

    Ok(Track {
        id: TrackId::new(id),
        title: row.get("title"),
        artist: row.get("artist"),
        album: row.get("album"),
        duration,
        year,
        artwork: row.get("artwork"),
        uri: row.get("uri"),
    })
}
