//! L3: durable cache tier backed by SQLite
//!
//! Schema is created by `wayfind_common::db::init_cache_database`.
//! Timestamps are stored as unix milliseconds.

use super::{CacheEntry, CacheTier};
use crate::error::CacheTierError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;

const TIER: &str = "l3";

pub struct DurableTier {
    pool: SqlitePool,
    ttl_ceiling: Duration,
}

impl DurableTier {
    pub fn new(pool: SqlitePool, ttl_ceiling: Duration) -> Self {
        Self { pool, ttl_ceiling }
    }

    /// Delete rows expired at `now`; returns the number removed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheTierError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| CacheTierError::new(TIER, e))?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "Purged expired durable cache entries");
        }
        Ok(removed)
    }
}

#[async_trait]
impl CacheTier for DurableTier {
    fn name(&self) -> &'static str {
        TIER
    }

    fn ttl_ceiling(&self) -> Duration {
        self.ttl_ceiling
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheTierError> {
        let row = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT value, stored_at, expires_at FROM cache_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CacheTierError::new(TIER, e))?;

        let Some((value, stored_at_ms, expires_at_ms)) = row else {
            return Ok(None);
        };

        let stored_at = DateTime::from_timestamp_millis(stored_at_ms).ok_or_else(|| {
            CacheTierError::new(TIER, format!("invalid stored_at {}", stored_at_ms))
        })?;
        let ttl = Duration::from_millis(expires_at_ms.saturating_sub(stored_at_ms).max(0) as u64);

        Ok(Some(CacheEntry::new(key, value, stored_at, ttl)))
    }

    async fn set(&self, entry: &CacheEntry) -> Result<(), CacheTierError> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, stored_at, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                stored_at = excluded.stored_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.stored_at.timestamp_millis())
        .bind(entry.expires_at().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| CacheTierError::new(TIER, e))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheTierError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheTierError::new(TIER, e))?;
        Ok(())
    }
}
