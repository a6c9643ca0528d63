//! Shared application state threaded through every Axum handler via the
//! `State<App>` extractor — carries the DB pool, HTTP client, cache, and
//! every subsystem handle the admin endpoints and background loops share.

use std::sync::Arc;

use crate::ai::AIProcessor;
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::health::HealthRegistry;
use crate::http::rate_limit::GlobalRateLimit;
use crate::scrape::ScrapeOrchestrator;
use crate::store::Store;

#[cfg(feature = "browser-fallback")]
use crate::scrape::browser_extract::BrowserExtractor;

#[derive(Clone)]
pub struct App {
    pub store: Store,
    pub cache: Arc<Cache>,
    pub http: reqwest::Client,
    pub health: Arc<HealthRegistry>,
    pub config: Arc<ServerConfig>,
    /// Shared with the `Scheduler`-owned background loops so an admin
    /// trigger observes (and updates) the same breaker/limiter state.
    pub scrape: Arc<ScrapeOrchestrator>,
    pub ai: Option<Arc<AIProcessor>>,
    /// Backs the `X-RateLimit-*` response headers and 429 admission control.
    pub rate_limit: Arc<GlobalRateLimit>,
    #[cfg(feature = "browser-fallback")]
    pub browser: Option<Arc<BrowserExtractor>>,
}

impl App {
    #[cfg(feature = "browser-fallback")]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        cache: Arc<Cache>,
        http: reqwest::Client,
        health: Arc<HealthRegistry>,
        config: Arc<ServerConfig>,
        scrape: Arc<ScrapeOrchestrator>,
        ai: Option<Arc<AIProcessor>>,
        browser: Option<Arc<BrowserExtractor>>,
    ) -> Self {
        let rate_limit = Arc::new(GlobalRateLimit::new(config.api.global_rate_limit_per_min));
        Self { store, cache, http, health, config, scrape, ai, rate_limit, browser }
    }

    #[cfg(not(feature = "browser-fallback"))]
    pub fn new(
        store: Store,
        cache: Arc<Cache>,
        http: reqwest::Client,
        health: Arc<HealthRegistry>,
        config: Arc<ServerConfig>,
        scrape: Arc<ScrapeOrchestrator>,
        ai: Option<Arc<AIProcessor>>,
    ) -> Self {
        let rate_limit = Arc::new(GlobalRateLimit::new(config.api.global_rate_limit_per_min));
        Self { store, cache, http, health, config, scrape, ai, rate_limit }
    }
}
