//! In-memory cache store
//!
//! Suitable for single-replica deployments and tests. Entries live for the
//! lifetime of the process.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::store::CacheStore;
use crate::models::CacheEntry;
use crate::Result;

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<(String, String), CacheEntry>,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, provider: &str, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .entries
            .get(&(provider.to_string(), key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<()> {
        match self.entries.entry((entry.provider.clone(), entry.key.clone())) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().fetched_at <= entry.fetched_at {
                    occupied.insert(entry);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_entry() {
        let store = MemoryCacheStore::new();
        assert!(store.get("youtube", "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let store = MemoryCacheStore::new();
        let first = Utc::now();
        store
            .upsert(CacheEntry::new("youtube", "abc", json!({"v": 1}), first))
            .await
            .unwrap();
        store
            .upsert(CacheEntry::new("youtube", "abc", json!({"v": 2}), first + Duration::seconds(5)))
            .await
            .unwrap();

        let entry = store.get("youtube", "abc").await.unwrap().unwrap();
        assert_eq!(entry.payload, json!({"v": 2}));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_newer_entry() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();
        store
            .upsert(CacheEntry::new("youtube", "abc", json!({"v": "new"}), now))
            .await
            .unwrap();
        store
            .upsert(CacheEntry::new("youtube", "abc", json!({"v": "old"}), now - Duration::seconds(5)))
            .await
            .unwrap();

        let entry = store.get("youtube", "abc").await.unwrap().unwrap();
        assert_eq!(entry.payload, json!({"v": "new"}));
        assert_eq!(entry.fetched_at, now);
    }

    #[tokio::test]
    async fn test_providers_are_separate_namespaces() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();
        store
            .upsert(CacheEntry::new("youtube", "abc", json!("yt"), now))
            .await
            .unwrap();
        store
            .upsert(CacheEntry::new("vimeo", "abc", json!("vm"), now))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get("vimeo", "abc").await.unwrap().unwrap().payload,
            json!("vm")
        );
    }
}
