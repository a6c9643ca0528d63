//! Two-tier read cache. A read tries L1, then L2 (populating L1
//! on hit), then the caller's source-of-truth closure. Concurrent misses on
//! the same key are coalesced via single-flight so a hot key doesn't cause
//! a fetch storm.

pub mod keys;
mod l1;
mod l2;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

pub use keys::Tag;
use l1::L1Cache;
use l2::L2Cache;

pub struct Cache {
    l1: L1Cache,
    l2: Option<L2Cache>,
    tags: Mutex<HashMap<Tag, HashSet<String>>>,
    in_flight: Mutex<HashMap<String, Arc<Notify>>>,
}

impl Cache {
    pub fn new(l1_max_entries: usize, l2: Option<L2Cache>) -> Self {
        Self {
            l1: L1Cache::new(l1_max_entries),
            l2,
            tags: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Connects the optional L2 tier from a `redis_url`, if configured and
    /// the `distributed-cache` feature is compiled in. A failed connection
    /// degrades to L1-only rather than failing startup.
    #[cfg(feature = "distributed-cache")]
    pub async fn connect(l1_max_entries: usize, redis_url: Option<&str>) -> Self {
        let l2 = match redis_url {
            Some(url) => match L2Cache::connect(url).await {
                Ok(l2) => Some(l2),
                Err(e) => {
                    tracing::warn!(?e, "failed to connect to redis, running L1-only");
                    None
                }
            },
            None => None,
        };
        Self::new(l1_max_entries, l2)
    }

    #[cfg(not(feature = "distributed-cache"))]
    pub async fn connect(l1_max_entries: usize, _redis_url: Option<&str>) -> Self {
        Self::new(l1_max_entries, None)
    }

    pub fn tag(&self, tag: Tag, key: &str) {
        self.tags.lock().unwrap().entry(tag).or_default().insert(key.to_string());
    }

    /// Deletes every key associated with `tag` in one step, without key
    /// scanning.
    pub async fn invalidate_tag(&self, tag: Tag) {
        let keys: Vec<String> = {
            let mut tags = self.tags.lock().unwrap();
            tags.remove(&tag).map(|s| s.into_iter().collect()).unwrap_or_default()
        };
        for key in keys {
            self.l1.invalidate(&key).await;
            if let Some(l2) = &self.l2 {
                l2.invalidate(&key).await;
            }
        }
    }

    pub async fn invalidate_key(&self, key: &str) {
        self.l1.invalidate(key).await;
        if let Some(l2) = &self.l2 {
            l2.invalidate(key).await;
        }
    }

    /// Direct typed read, bypassing single-flight coalescing — for callers
    /// that batch their own misses (e.g. StockEnricher's one-quote-request
    /// policy) rather than fetching one key at a time.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_raw(key).await.and_then(|raw| serde_json::from_value(raw).ok())
    }

    pub async fn set<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Ok(raw) = serde_json::to_value(value) {
            self.set_raw(key, &raw, ttl).await;
        }
    }

    async fn get_raw(&self, key: &str) -> Option<serde_json::Value> {
        if let Some(v) = self.l1.get(key).await {
            return Some(v);
        }
        if let Some(l2) = &self.l2 {
            if let Some(v) = l2.get(key).await {
                self.l1.set(key.to_string(), v.clone(), keys::GET_TTL).await;
                return Some(v);
            }
        }
        None
    }

    async fn set_raw(&self, key: &str, value: &serde_json::Value, ttl: Duration) {
        self.l1.set(key.to_string(), value.clone(), ttl).await;
        if let Some(l2) = &self.l2 {
            l2.set(key, value, ttl).await;
        }
    }

    /// Typed get-or-populate with single-flight coalescing. `fetch` is only
    /// invoked once per key even when many callers miss concurrently.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, crate::error::CoreError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, crate::error::CoreError>>,
    {
        if let Some(raw) = self.get_raw(key).await {
            if let Ok(value) = serde_json::from_value(raw) {
                return Ok(value);
            }
        }

        let notify = {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(existing) = in_flight.get(key).cloned() {
                Some(existing)
            } else {
                in_flight.insert(key.to_string(), Arc::new(Notify::new()));
                None
            }
        };

        if let Some(notify) = notify {
            notify.notified().await;
            if let Some(raw) = self.get_raw(key).await {
                if let Ok(value) = serde_json::from_value(raw) {
                    return Ok(value);
                }
            }
            // the leader's fetch failed; fall through and retry ourselves
        }

        let result = fetch().await;
        if let Ok(value) = &result {
            if let Ok(raw) = serde_json::to_value(value) {
                self.set_raw(key, &raw, ttl).await;
            }
        }

        if let Some(leader_notify) = self.in_flight.lock().unwrap().remove(key) {
            leader_notify.notify_waiters();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn single_flight_coalesces_concurrent_misses() {
        let cache = Arc::new(Cache::new(100, None));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch::<i32, _, _>("k", Duration::from_secs(60), || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(7)
                        }
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 7);
        }
        // the 20ms fetch delay comfortably outlasts the scheduling window in
        // which the other 4 callers join as followers rather than leaders
        assert!(calls.load(Ordering::SeqCst) <= 2, "calls = {}", calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tag_invalidation_clears_tagged_keys_only() {
        let cache = Cache::new(100, None);
        cache.set_raw("v1:articles:list:a", &serde_json::json!(1), Duration::from_secs(60)).await;
        cache.set_raw("v1:articles:get:1", &serde_json::json!(2), Duration::from_secs(60)).await;
        cache.tag(Tag::ArticlesList, "v1:articles:list:a");
        cache.invalidate_tag(Tag::ArticlesList).await;
        assert_eq!(cache.get_raw("v1:articles:list:a").await, None);
        assert_eq!(cache.get_raw("v1:articles:get:1").await, Some(serde_json::json!(2)));
    }
}
