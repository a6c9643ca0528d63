//! Renders a page and extracts text as a last-resort fallback behind the
//! HTML extractor. Every acquisition observes a global concurrency cap
//! separate from the pool size.

#![cfg(feature = "browser-fallback")]

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;

use super::browser_pool::BrowserPool;
use super::html_extract::{extract_from_html, ExtractMethod, Extracted};
use crate::error::CoreError;
use crate::health::{ComponentStatus, HealthRegistry};

pub struct BrowserExtractor {
    pool: Arc<BrowserPool>,
    concurrency: Arc<Semaphore>,
    wait_after_load: Duration,
    health: Arc<HealthRegistry>,
}

impl BrowserExtractor {
    pub fn new(pool: Arc<BrowserPool>, max_concurrent: usize, wait_after_load: Duration, health: Arc<HealthRegistry>) -> Self {
        Self { pool, concurrency: Arc::new(Semaphore::new(max_concurrent.max(1))), wait_after_load, health }
    }

    pub async fn extract(&self, url: &str, source: &str, acquire_deadline: Duration) -> Result<Extracted, CoreError> {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .map_err(|_| CoreError::Cancelled)?;

        let mut handle = self.pool.acquire(acquire_deadline).await?;

        let result = self.navigate_and_extract(&handle.page, url, source).await;
        if result.is_err() {
            handle.poison();
            self.health.set("browser_pool", ComponentStatus::Degraded);
        } else {
            self.health.set("browser_pool", ComponentStatus::Healthy);
        }

        result.map(|text| Extracted { text, method: ExtractMethod::Browser })
    }

    async fn navigate_and_extract(&self, page: &chromiumoxide::Page, url: &str, source: &str) -> Result<String, CoreError> {
        // stealth: synthesize navigator.chrome and hide the automation flag
        //; best-effort, failures here are not fatal.
        let _ = page
            .evaluate_on_new_document(
                "Object.defineProperty(navigator, 'webdriver', {get: () => undefined}); window.chrome = { runtime: {} };",
            )
            .await;

        page.goto(url).await.map_err(|e| CoreError::Transient(e.to_string()))?;
        page.wait_for_navigation().await.map_err(|e| CoreError::Transient(e.to_string()))?;

        tokio::time::sleep(self.wait_after_load).await;

        // small randomized scroll to look like a human reader, not a bot
        let scroll_px = rand::rng().random_range(200..600);
        let _ = page
            .evaluate(format!("window.scrollBy(0, {scroll_px})"))
            .await;
        let jitter_ms = rand::rng().random_range(100..400);
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

        let html = page.content().await.map_err(|e| CoreError::Transient(e.to_string()))?;
        match extract_from_html(&html, source) {
            Ok(extracted) => Ok(extracted.text),
            Err(e) => Err(e),
        }
    }
}
