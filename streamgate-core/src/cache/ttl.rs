//! Read-through cache with a per-call freshness window
//!
//! Staleness is computed on every read from `fetched_at`; nothing is ever
//! evicted from the store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::singleflight::SingleFlight;
use super::store::CacheStore;
use crate::models::CacheEntry;
use crate::{Error, Result};

#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn CacheStore>,
    flights: SingleFlight<Value>,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").finish_non_exhaustive()
    }
}

impl TtlCache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            flights: SingleFlight::new(),
        }
    }

    /// Return the cached payload for `(provider, key)` if it is younger than
    /// `ttl`, otherwise call `fetch`, store its result and return it.
    ///
    /// A failed fetch surfaces as [`Error::UpstreamUnavailable`] and leaves the
    /// stored entry untouched. Concurrent misses on the same key share one
    /// `fetch` call.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        provider: &str,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Value>> + Send,
    {
        if let Some(payload) = self.lookup_fresh(provider, key, ttl).await {
            debug!(provider, key, "cache hit");
            return Ok(payload);
        }

        let flight_key = format!("{provider}:{key}");
        let payload = self
            .flights
            .do_work(flight_key, async move {
                // A flight that finished just before this one started may
                // already have refreshed the entry.
                if let Some(payload) = self.lookup_fresh(provider, key, ttl).await {
                    return Ok(payload);
                }

                debug!(provider, key, "cache miss, fetching upstream");
                let payload = fetch().await.map_err(|e| match e {
                    Error::UpstreamUnavailable(_) => e,
                    other => Error::UpstreamUnavailable(other.to_string()),
                })?;

                let entry = CacheEntry::new(provider, key, payload.clone(), Utc::now());
                if let Err(e) = self.store.upsert(entry).await {
                    warn!(provider, key, error = %e, "failed to store cache entry");
                }
                Ok(payload)
            })
            .await?;

        Ok(payload)
    }

    async fn lookup_fresh(&self, provider: &str, key: &str, ttl: Duration) -> Option<Value> {
        match self.store.get(provider, key).await {
            Ok(Some(entry)) if entry.is_fresh(ttl, Utc::now()) => Some(entry.payload),
            Ok(_) => None,
            Err(e) => {
                warn!(provider, key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }
}
