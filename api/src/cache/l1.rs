//! Bounded in-process cache tier: per-entry TTL, evicted on
//! size and TTL. Built on `scc::HashMap` for lock-free reads/writes; a small
//! recency queue behind a mutex backs eviction once the entry cap is hit —
//! contended only on the (rare) insert-at-capacity path, never on reads.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use scc::HashMap as SccMap;

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

pub struct L1Cache {
    entries: SccMap<String, Entry>,
    recency: Mutex<VecDeque<String>>,
    max_entries: usize,
}

impl L1Cache {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: SccMap::new(), recency: Mutex::new(VecDeque::new()), max_entries }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let hit = self.entries.read_async(key, |_, entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        }).await;
        match hit {
            Some(Some(value)) => Some(value),
            Some(None) => {
                // expired; remove lazily
                let _ = self.entries.remove_async(key).await;
                None
            }
            None => None,
        }
    }

    pub async fn set(&self, key: String, value: serde_json::Value, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let is_new = self.entries.upsert_async(key.clone(), Entry { value, expires_at }).await.is_none();
        if is_new {
            self.evict_if_over_capacity(key).await;
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let _ = self.entries.remove_async(key).await;
    }

    /// Deletes every key whose prefix matches — used for `articles:list:*`
    /// style patterns. Real tag-set invalidation (see `cache::mod`) avoids
    /// this scan in the hot path; this is the fallback for ad hoc prefixes.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut to_remove = Vec::new();
        self.entries
            .scan_async(|k, _| {
                if k.starts_with(prefix) {
                    to_remove.push(k.clone());
                }
            })
            .await;
        for key in to_remove {
            let _ = self.entries.remove_async(&key).await;
        }
    }

    async fn evict_if_over_capacity(&self, new_key: String) {
        let evicted = {
            let mut recency = self.recency.lock().unwrap();
            recency.push_back(new_key);
            if recency.len() > self.max_entries {
                recency.pop_front()
            } else {
                None
            }
        };
        if let Some(key) = evicted {
            let _ = self.entries.remove_async(&key).await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_within_ttl() {
        let cache = L1Cache::new(10);
        cache.set("k".into(), serde_json::json!(1), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = L1Cache::new(10);
        cache.set("k".into(), serde_json::json!(1), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn evicts_oldest_over_capacity() {
        let cache = L1Cache::new(2);
        cache.set("a".into(), serde_json::json!(1), Duration::from_secs(60)).await;
        cache.set("b".into(), serde_json::json!(2), Duration::from_secs(60)).await;
        cache.set("c".into(), serde_json::json!(3), Duration::from_secs(60)).await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("c").await, Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn invalidate_prefix_removes_matching_keys() {
        let cache = L1Cache::new(10);
        cache.set("v1:articles:list:a".into(), serde_json::json!(1), Duration::from_secs(60)).await;
        cache.set("v1:articles:list:b".into(), serde_json::json!(2), Duration::from_secs(60)).await;
        cache.set("v1:articles:get:1".into(), serde_json::json!(3), Duration::from_secs(60)).await;
        cache.invalidate_prefix("v1:articles:list:").await;
        assert_eq!(cache.get("v1:articles:list:a").await, None);
        assert_eq!(cache.get("v1:articles:get:1").await, Some(serde_json::json!(3)));
    }
}
