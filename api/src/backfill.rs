//! Periodic worker that backfills body text for articles the scraper
//! inserted without content (e.g. RSS-only sources). Claims a batch,
//! tries the HTML extractor, falls back to the headless browser on
//! `NoContent`.

#[cfg(feature = "browser-fallback")]
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ContentBackfillConfig;
use crate::error::CoreError;
use crate::scrape::html_extract::HtmlExtractor;
use crate::scrape::robots::{RobotsDecision, RobotsGate};
use crate::store::Store;

#[cfg(feature = "browser-fallback")]
use crate::scrape::browser_extract::BrowserExtractor;

pub struct ContentBackfill {
    store: Store,
    html: HtmlExtractor,
    robots: RobotsGate,
    #[cfg(feature = "browser-fallback")]
    browser: Option<Arc<BrowserExtractor>>,
    config: ContentBackfillConfig,
}

impl ContentBackfill {
    #[cfg(feature = "browser-fallback")]
    pub fn new(
        store: Store,
        http: reqwest::Client,
        config: ContentBackfillConfig,
        browser: Option<Arc<BrowserExtractor>>,
    ) -> Self {
        Self {
            store,
            html: HtmlExtractor::new(http.clone()),
            robots: RobotsGate::new(http),
            browser,
            config,
        }
    }

    #[cfg(not(feature = "browser-fallback"))]
    pub fn new(store: Store, http: reqwest::Client, config: ContentBackfillConfig) -> Self {
        Self {
            store,
            html: HtmlExtractor::new(http.clone()),
            robots: RobotsGate::new(http),
            config,
        }
    }

    /// Runs until cancelled, sleeping `interval_min` between batches.
    pub async fn run_loop(&self, cancel: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("content backfill disabled");
            return;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("content backfill stopping");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.interval_min * 60)) => {}
            }

            match self.run_once().await {
                Ok(n) if n > 0 => tracing::info!(articles = n, "content backfill batch completed"),
                Ok(_) => {}
                Err(e) => tracing::warn!(?e, "content backfill batch failed"),
            }
        }
    }

    pub async fn run_once(&self) -> Result<usize, CoreError> {
        let claimed = self.store.claim_pending_for_content(self.config.batch_size).await?;
        let mut processed = 0;

        for article in claimed {
            tokio::time::sleep(Duration::from_millis(self.config.delay_sec * 1000)).await;

            match self.backfill_one(&article.url, &article.source).await {
                Ok(text) => {
                    self.store.write_content(article.id, &text).await?;
                }
                Err(_) => {
                    self.store.write_content_failure(article.id, self.config.max_attempts).await?;
                }
            }
            processed += 1;
        }

        Ok(processed)
    }

    async fn backfill_one(&self, url: &str, source: &str) -> Result<String, CoreError> {
        let parsed = url::Url::parse(url).map_err(|e| CoreError::Transient(e.to_string()))?;
        if self.robots.check(&parsed).await == RobotsDecision::Deny {
            return Err(CoreError::Blocked(url.to_string()));
        }

        match self.html.extract(url, source).await {
            Ok(extracted) => return Ok(extracted.text),
            Err(CoreError::NoContent) => {}
            Err(e) => return Err(e),
        }

        #[cfg(feature = "browser-fallback")]
        if let Some(browser) = &self.browser {
            let extracted = browser.extract(url, source, Duration::from_secs(30)).await?;
            return Ok(extracted.text);
        }

        Err(CoreError::NoContent)
    }
}
