//! PostgreSQL-backed cache store shared by all replicas

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::cache::CacheStore;
use crate::models::CacheEntry;
use crate::Result;

#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, provider: &str, key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT provider, key, payload, fetched_at
            FROM cache_entries
            WHERE provider = $1 AND key = $2
            "#,
        )
        .bind(provider)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<CacheEntry> {
            Ok(CacheEntry {
                provider: row.try_get("provider")?,
                key: row.try_get("key")?,
                payload: row.try_get("payload")?,
                fetched_at: row.try_get("fetched_at")?,
            })
        })
        .transpose()
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        // Last writer wins, except a write carrying an older fetched_at.
        let result = sqlx::query(
            r#"
            INSERT INTO cache_entries (provider, key, payload, fetched_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, key) DO UPDATE
            SET payload = EXCLUDED.payload, fetched_at = EXCLUDED.fetched_at
            WHERE cache_entries.fetched_at <= EXCLUDED.fetched_at
            "#,
        )
        .bind(&entry.provider)
        .bind(&entry.key)
        .bind(&entry.payload)
        .bind(entry.fetched_at)
        .execute(&self.pool)
        .await?;

        debug!(
            provider = %entry.provider,
            key = %entry.key,
            rows = result.rows_affected(),
            "Upserted cache entry"
        );
        Ok(())
    }
}
