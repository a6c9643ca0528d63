//! Per-host robots.txt fetch/parse/cache: an `arc_swap`-backed snapshot
//! with an explicit TTL, rather than a plain `Mutex<HashMap>`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use robotxt::Robots;

use crate::error::CoreError;

const USER_AGENT: &str = "nl-news-aggregator";
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct CachedRobots {
    robots: Robots,
    cached_at: Instant,
}

pub struct RobotsGate {
    http: reqwest::Client,
    cache: ArcSwap<HashMap<String, Arc<CachedRobots>>>,
    /// URLs denied at least once, kept forever regardless of the host
    /// document's TTL — a deny is a permanent per-URL fact for this process.
    denied: ArcSwap<HashSet<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsDecision {
    Allow,
    Deny,
}

impl RobotsGate {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http, cache: ArcSwap::from_pointee(HashMap::new()), denied: ArcSwap::from_pointee(HashSet::new()) }
    }

    pub async fn check(&self, url: &url::Url) -> RobotsDecision {
        let key = Self::deny_key(url);
        if self.denied.load().contains(&key) {
            return RobotsDecision::Deny;
        }

        let Some(host) = url.host_str() else {
            return RobotsDecision::Allow;
        };
        let robots = match self.get_or_fetch(host, url).await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(%host, ?err, "robots.txt fetch failed, defaulting to allow");
                return RobotsDecision::Allow;
            }
        };
        if robots.is_absolute_allowed(url) {
            RobotsDecision::Allow
        } else {
            let mut next = (**self.denied.load()).clone();
            next.insert(key);
            self.denied.store(Arc::new(next));
            RobotsDecision::Deny
        }
    }

    fn deny_key(url: &url::Url) -> String {
        format!("{}://{}{}", url.scheme(), url.host_str().unwrap_or(""), url.path())
    }

    async fn get_or_fetch(&self, host: &str, url: &url::Url) -> Result<Robots, CoreError> {
        if let Some(entry) = self.cache.load().get(host) {
            if entry.cached_at.elapsed() < CACHE_TTL {
                return Ok(entry.robots.clone());
            }
        }

        let base = url::Url::parse(&format!("{}://{}/", url.scheme(), host))
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        let robots_url = robotxt::create_url(&base).map_err(|e| CoreError::Transient(e.to_string()))?;

        let body = match self.http.get(robots_url).send().await {
            Ok(resp) => resp.text().await.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(%host, %err, "robots.txt unreachable, treating as allow");
                String::new()
            }
        };

        let robots = if body.is_empty() {
            Robots::from_always(true, USER_AGENT)
        } else {
            Robots::from_bytes(body.as_bytes(), USER_AGENT)
        };

        let mut next = (**self.cache.load()).clone();
        next.insert(host.to_string(), Arc::new(CachedRobots { robots: robots.clone(), cached_at: Instant::now() }));
        self.cache.store(Arc::new(next));

        Ok(robots)
    }

    pub fn crawl_delay(&self, host: &str) -> Option<Duration> {
        self.cache.load().get(host).and_then(|e| e.robots.crawl_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_key_ignores_query_and_fragment() {
        let a = url::Url::parse("https://example.com/a/b?x=1").unwrap();
        let b = url::Url::parse("https://example.com/a/b?x=2#frag").unwrap();
        assert_eq!(RobotsGate::deny_key(&a), RobotsGate::deny_key(&b));
    }

    #[test]
    fn deny_key_distinguishes_paths_and_hosts() {
        let a = url::Url::parse("https://example.com/a").unwrap();
        let b = url::Url::parse("https://example.com/b").unwrap();
        let c = url::Url::parse("https://other.com/a").unwrap();
        assert_ne!(RobotsGate::deny_key(&a), RobotsGate::deny_key(&b));
        assert_ne!(RobotsGate::deny_key(&a), RobotsGate::deny_key(&c));
    }

    #[tokio::test]
    async fn a_denied_url_stays_denied_after_manual_reinsertion() {
        let gate = RobotsGate::new(reqwest::Client::new());
        let url = url::Url::parse("https://example.com/private").unwrap();
        let key = RobotsGate::deny_key(&url);

        let mut denied = std::collections::HashSet::new();
        denied.insert(key.clone());
        gate.denied.store(Arc::new(denied));

        // Simulate the host's robots.txt later becoming permissive: the
        // per-host document cache would now say "allow", but `check` must
        // never reach it because the sticky deny set is consulted first.
        assert_eq!(gate.check(&url).await, RobotsDecision::Deny);
        assert!(gate.denied.load().contains(&key));
    }
}
