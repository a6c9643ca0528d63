//! Drives RSSFetcher -> HTMLExtractor -> BrowserExtractor per source under
//! the rate limiter, breaker, and robots gate; batch-dedupes via Store;
//! reports job outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use crate::cache::{Cache, Tag};
use crate::config::{ScrapingConfig, TargetSite};
use crate::error::CoreError;
use crate::models::source::Source;
use crate::store::Store;

use super::breaker::CircuitBreaker;
use super::html_extract::HtmlExtractor;
use super::limiter::RateLimiter;
use super::robots::{RobotsDecision, RobotsGate};
use super::rss::RssFetcher;

#[cfg(feature = "browser-fallback")]
use super::browser_extract::BrowserExtractor;

const ACQUIRE_DEADLINE: Duration = Duration::from_secs(30);

pub struct ScrapeOrchestrator {
    store: Store,
    cache: Arc<Cache>,
    rss: RssFetcher,
    html: HtmlExtractor,
    #[cfg(feature = "browser-fallback")]
    browser: Option<Arc<BrowserExtractor>>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    robots: RobotsGate,
    config: ScrapingConfig,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunSummary {
    pub sources_run: usize,
    pub articles_new: usize,
    pub articles_updated: usize,
}

impl ScrapeOrchestrator {
    #[cfg(feature = "browser-fallback")]
    pub fn new(
        store: Store,
        cache: Arc<Cache>,
        http: reqwest::Client,
        config: ScrapingConfig,
        browser: Option<Arc<BrowserExtractor>>,
    ) -> Self {
        Self {
            store,
            cache,
            rss: RssFetcher::new(http.clone()),
            html: HtmlExtractor::new(http.clone()),
            browser,
            limiter: RateLimiter::new(config.rate_limit_sec),
            breaker: CircuitBreaker::new(),
            robots: RobotsGate::new(http),
            config,
        }
    }

    #[cfg(not(feature = "browser-fallback"))]
    pub fn new(store: Store, cache: Arc<Cache>, http: reqwest::Client, config: ScrapingConfig) -> Self {
        Self {
            store,
            cache,
            rss: RssFetcher::new(http.clone()),
            html: HtmlExtractor::new(http.clone()),
            limiter: RateLimiter::new(config.rate_limit_sec),
            breaker: CircuitBreaker::new(),
            robots: RobotsGate::new(http),
            config,
        }
    }

    /// Runs all active sources (or a single named one), up to
    /// `max_concurrent_sources` in parallel.
    pub async fn run(&self, only_source: Option<&str>) -> Result<RunSummary, CoreError> {
        let sources = self.store.sources_ready_to_scrape().await?;
        let targets: Vec<&Source> = sources
            .iter()
            .filter(|s| only_source.is_none_or(|name| s.name == name || s.domain == name))
            .collect();

        let results: Vec<Result<(usize, usize), CoreError>> = stream::iter(targets)
            .map(|source| self.run_one(source))
            .buffer_unordered(self.config.max_concurrent_sources)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for result in results {
            summary.sources_run += 1;
            if let Ok((new, updated)) = result {
                summary.articles_new += new;
                summary.articles_updated += updated;
            }
        }

        if summary.articles_new > 0 || summary.articles_updated > 0 {
            self.cache.invalidate_tag(Tag::ArticlesList).await;
            self.cache.invalidate_tag(Tag::ArticlesStats).await;
        }

        Ok(summary)
    }

    async fn run_one(&self, source: &Source) -> Result<(usize, usize), CoreError> {
        let method = if source.use_browser_fallback { "hybrid" } else { "rss" };
        let (job_id, _job_uuid) = self.store.open_job(&source.domain, method, 3).await?;
        let started = Instant::now();

        match self.run_one_inner(source).await {
            Ok((new, updated, skipped)) => {
                self.store
                    .record_job(job_id, source.domain.clone(), "completed", (new + updated + skipped) as i32, new as i32, updated as i32, skipped as i32, None, None)
                    .await?;
                tracing::info!(source = %source.domain, new, updated, elapsed = ?started.elapsed(), "scrape run completed");
                Ok((new, updated))
            }
            Err(CoreError::BreakerOpen(_)) => {
                self.store
                    .record_job(job_id, source.domain.clone(), "completed", 0, 0, 0, 0, None, None)
                    .await?;
                Ok((0, 0))
            }
            Err(e) => {
                self.store
                    .record_job(job_id, source.domain.clone(), "failed", 0, 0, 0, 0, Some(e.to_string()), Some(error_code(&e)))
                    .await?;
                Err(e)
            }
        }
    }

    async fn run_one_inner(&self, source: &Source) -> Result<(usize, usize, usize), CoreError> {
        self.breaker.before_call(&source.domain)?;
        self.limiter.acquire(&source.domain, ACQUIRE_DEADLINE).await?;

        let site = TargetSite {
            name: source.name.clone(),
            domain: source.domain.clone(),
            feed_url: source.feed_url.clone(),
            use_rss: source.use_rss,
            use_browser_fallback: source.use_browser_fallback,
        };

        let fetch_result = self.rss.fetch(&site).await;
        let drafts = match fetch_result {
            Ok(d) => d,
            Err(e) => {
                self.breaker.record_failure(&source.domain);
                return Err(e);
            }
        };

        let urls: Vec<String> = drafts.iter().map(|d| d.url.clone()).collect();
        let known = self.store.existing_urls(&urls).await?;
        let candidates: Vec<_> = drafts.into_iter().filter(|d| !known.contains(&d.url)).collect();
        let skipped = urls.len() - candidates.len();

        let outcome = self.store.upsert_articles(candidates).await?;
        self.breaker.record_success(&source.domain);

        if source.use_browser_fallback {
            let bounded: Vec<i64> = outcome.inserted_ids.iter().take(self.config.max_articles_per_scrape).copied().collect();
            for article_id in bounded {
                if let Err(e) = self.enrich_one(article_id, &source.domain).await {
                    tracing::warn!(%article_id, source = %source.domain, ?e, "content enrichment failed during scrape");
                }
            }
        }

        Ok((outcome.inserted_ids.len(), outcome.updated_ids.len(), skipped))
    }

    async fn enrich_one(&self, article_id: i64, source: &str) -> Result<(), CoreError> {
        let article = self.store.get_article(article_id).await?.ok_or(CoreError::Permanent("missing article".into()))?;

        let url = url::Url::parse(&article.url).map_err(|e| CoreError::Transient(e.to_string()))?;
        if self.config.enable_robots_txt_check && self.robots.check(&url).await == RobotsDecision::Deny {
            return Err(CoreError::Blocked(article.url));
        }

        match self.html.extract(&article.url, source).await {
            Ok(extracted) => {
                self.store.write_content(article_id, &extracted.text).await?;
                return Ok(());
            }
            Err(CoreError::NoContent) => {}
            Err(e) => return Err(e),
        }

        #[cfg(feature = "browser-fallback")]
        if let Some(browser) = &self.browser {
            match browser.extract(&article.url, source, ACQUIRE_DEADLINE).await {
                Ok(extracted) => {
                    self.store.write_content(article_id, &extracted.text).await?;
                    return Ok(());
                }
                Err(CoreError::NoContent) => return Err(CoreError::NoContent),
                Err(e) => return Err(e),
            }
        }

        Err(CoreError::NoContent)
    }
}

fn error_code(e: &CoreError) -> String {
    match e {
        CoreError::Transient(_) => "TRANSIENT",
        CoreError::RateLimited => "RATE_LIMITED",
        CoreError::BreakerOpen(_) => "BREAKER_OPEN",
        CoreError::Blocked(_) => "BLOCKED",
        CoreError::NoContent => "NO_CONTENT",
        CoreError::ParseError(_) => "PARSE_ERROR",
        CoreError::Conflict(_) => "CONFLICT",
        CoreError::Permanent(_) => "PERMANENT",
        CoreError::Cancelled => "CANCELLED",
    }
    .to_string()
}
