//! Integer preferences
//!
//! Keys are the constants in `gramophone_core::storage::keys`; values are
//! plain integers (mode codes, positions, milliseconds, 0/1 flags).

use crate::error::Result;
use sqlx::{Row, SqlitePool};

/// Read a preference, `None` when it was never written
pub async fn get_int(pool: &SqlitePool, key: &str) -> Result<Option<i64>> {
    let row = sqlx::query("SELECT value FROM preferences WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("value")))
}

/// Write a preference
pub async fn set_int(pool: &SqlitePool, key: &str, value: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO preferences (key, value, updated_at)
         VALUES (?, ?, strftime('%s', 'now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// All stored preferences, ordered by key
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query("SELECT key, value FROM preferences ORDER BY key")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|r| (r.get("key"), r.get("value")))
        .collect())
}
