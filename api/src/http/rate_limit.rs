//! Global per-process request admission and the `X-RateLimit-*` headers
//! every response carries. Distinct from the per-source
//! `scrape::limiter::RateLimiter`: this one guards the API surface itself
//! against a single noisy client, not outbound scraping.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::app::App;
use crate::error::{AppError, ErrorCode};

/// Fixed-window counter: `limit` requests per rolling 60s window, reset at
/// the window boundary. Plain struct and atomics, same direct-state shape
/// as `scrape::breaker::CircuitBreaker`.
pub struct GlobalRateLimit {
    limit: u32,
    window: Duration,
    remaining: AtomicU32,
    window_started: AtomicI64,
    started_at: Instant,
}

impl GlobalRateLimit {
    pub fn new(limit_per_min: u32) -> Self {
        Self {
            limit: limit_per_min.max(1),
            window: Duration::from_secs(60),
            remaining: AtomicU32::new(limit_per_min.max(1)),
            window_started: AtomicI64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Returns `(allowed, remaining, reset_in_secs)`, rolling the window
    /// over to a fresh quota once it has elapsed.
    fn check(&self) -> (bool, u32, u64) {
        let now_secs = self.started_at.elapsed().as_secs() as i64;
        let window_secs = self.window.as_secs() as i64;
        let started = self.window_started.load(Ordering::Acquire);

        if now_secs - started >= window_secs {
            // Roll the window over; a racing thread may also reset, which
            // just restarts the quota a few millis later. Harmless.
            self.window_started.store(now_secs, Ordering::Release);
            self.remaining.store(self.limit, Ordering::Release);
        }

        let reset_in = (window_secs - (now_secs - self.window_started.load(Ordering::Acquire))).max(0) as u64;

        let mut remaining = self.remaining.load(Ordering::Acquire);
        loop {
            if remaining == 0 {
                return (false, 0, reset_in);
            }
            match self.remaining.compare_exchange_weak(
                remaining,
                remaining - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return (true, remaining - 1, reset_in),
                Err(actual) => remaining = actual,
            }
        }
    }
}

pub async fn enforce(State(app): State<App>, request: Request, next: Next) -> Result<Response, AppError> {
    let (allowed, remaining, reset_in) = app.rate_limit.check();

    if !allowed {
        return Err(AppError::new(ErrorCode::RateLimitExceeded, "too many requests").with_details(serde_json::json!({
            "retry_after_secs": reset_in,
        })));
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(app.rate_limit.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_in));
    Ok(response)
}

pub type SharedGlobalRateLimit = Arc<GlobalRateLimit>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_denies() {
        let rl = GlobalRateLimit::new(2);
        assert!(rl.check().0);
        assert!(rl.check().0);
        let (allowed, remaining, _) = rl.check();
        assert!(!allowed);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn reports_descending_remaining() {
        let rl = GlobalRateLimit::new(3);
        let (_, r1, _) = rl.check();
        let (_, r2, _) = rl.check();
        assert_eq!(r1, 2);
        assert_eq!(r2, 1);
    }
}
