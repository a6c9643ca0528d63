//! Per-source token bucket: refill rate `1/rate_limit_sec`,
//! capacity 1 — strictly serializes requests to a given host.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as Governor};

use crate::error::CoreError;

pub struct RateLimiter {
    inner: Governor<String, DefaultKeyedStateStore<String>, DefaultClock>,
    clock: DefaultClock,
}

impl RateLimiter {
    pub fn new(rate_limit_sec: u64) -> Self {
        let period = Duration::from_secs(rate_limit_sec.max(1));
        let quota = Quota::with_period(period)
            .expect("rate_limit_sec > 0")
            .allow_burst(NonZeroU32::new(1).unwrap());
        Self { inner: Governor::keyed(quota), clock: DefaultClock::default() }
    }

    /// Tries to acquire a token for `key` within `deadline`. Fails with
    /// `RateLimited` (not a hard error — callers skip) if no token becomes
    /// available in time.
    pub async fn acquire(&self, key: &str, deadline: Duration) -> Result<(), CoreError> {
        let started = self.clock.now();
        loop {
            match self.inner.check_key(&key.to_string()) {
                Ok(()) => return Ok(()),
                Err(not_until) => {
                    let wait = not_until.wait_time_from(started);
                    if wait > deadline {
                        return Err(CoreError::RateLimited);
                    }
                    tokio::time::sleep(wait.min(deadline)).await;
                    if self.clock.now().duration_since(started) >= deadline {
                        return Err(CoreError::RateLimited);
                    }
                }
            }
        }
    }
}

pub type SharedRateLimiter = Arc<RateLimiter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_request_within_period_is_rate_limited() {
        let limiter = RateLimiter::new(3600);
        limiter.acquire("nos.nl", Duration::from_millis(50)).await.unwrap();
        let second = limiter.acquire("nos.nl", Duration::from_millis(50)).await;
        assert!(matches!(second, Err(CoreError::RateLimited)));
    }

    #[tokio::test]
    async fn different_sources_do_not_contend() {
        let limiter = RateLimiter::new(3600);
        limiter.acquire("nos.nl", Duration::from_millis(50)).await.unwrap();
        assert!(limiter.acquire("nu.nl", Duration::from_millis(50)).await.is_ok());
    }
}
