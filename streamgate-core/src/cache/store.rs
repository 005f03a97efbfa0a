use async_trait::async_trait;

use crate::models::CacheEntry;
use crate::Result;

/// Persistence for [`CacheEntry`] rows.
///
/// Implementations must make `upsert` atomic per `(provider, key)` and must
/// never move `fetched_at` backwards: an entry older than the stored one is
/// discarded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, provider: &str, key: &str) -> Result<Option<CacheEntry>>;

    async fn upsert(&self, entry: CacheEntry) -> Result<()>;
}
