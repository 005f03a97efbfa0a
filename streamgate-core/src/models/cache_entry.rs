//! Cached upstream lookup

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One cached payload, identified by `(provider, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub provider: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        key: impl Into<String>,
        payload: serde_json::Value,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provider: provider.into(),
            key: key.into(),
            payload,
            fetched_at,
        }
    }

    /// `true` while `now < fetched_at + ttl`.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.fetched_at.checked_add_signed(ttl))
            .is_some_and(|stale_at| now < stale_at)
    }
}
