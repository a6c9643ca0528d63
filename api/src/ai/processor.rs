//! Worker loop that claims pending articles and enriches them via an
//! `LlmWrapper`, on an adaptive cadence tied to queue depth.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::{Cache, Tag};
use crate::config::AiConfig;
use crate::error::CoreError;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::store::Store;

use super::llm::LlmWrapper;
use super::llm_client::ArticleText;

const MAX_BACKOFF_SEC: u64 = 30 * 60;

/// `Q<5 -> 10 min; Q<20 -> 5 min; Q<100 -> 2 min; else -> 1 min`.
fn interval_for_queue_depth(queue_depth: i64, config: &AiConfig) -> Duration {
    let minutes = if queue_depth < 5 {
        10
    } else if queue_depth < 20 {
        5
    } else if queue_depth < 100 {
        2
    } else {
        1
    };
    Duration::from_secs(minutes * 60).clamp(
        Duration::from_secs(config.min_interval_sec),
        Duration::from_secs(config.max_interval_sec),
    )
}

/// `adaptive_batch_size`: scales the claim size to the backlog, bounded by
/// the configured batch size.
fn adaptive_batch_size(queue_depth: i64, config: &AiConfig) -> i64 {
    queue_depth.clamp(1, config.batch_size)
}

pub struct AIProcessor {
    store: Store,
    cache: Arc<Cache>,
    llm: LlmWrapper,
    config: AiConfig,
    stock_notify: Option<tokio::sync::mpsc::UnboundedSender<Vec<i64>>>,
    health: Arc<HealthRegistry>,
}

impl AIProcessor {
    pub fn new(
        store: Store,
        cache: Arc<Cache>,
        llm: LlmWrapper,
        config: AiConfig,
        stock_notify: Option<tokio::sync::mpsc::UnboundedSender<Vec<i64>>>,
        health: Arc<HealthRegistry>,
    ) -> Self {
        Self { store, cache, llm, config, stock_notify, health }
    }

    pub async fn run_loop(&self, cancel: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("AI processor disabled");
            return;
        }

        let mut consecutive_empty_with_errors = 0u32;
        let mut backoff_multiplier = 1u32;

        loop {
            let queue_depth = self.store.count_pending_ai().await.unwrap_or(0);
            let base_interval = interval_for_queue_depth(queue_depth, &self.config);
            let interval = (base_interval * backoff_multiplier).min(Duration::from_secs(MAX_BACKOFF_SEC));

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("AI processor stopping");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            match self.run_cycle(queue_depth).await {
                Ok(progress) if progress.enriched > 0 => {
                    consecutive_empty_with_errors = 0;
                    backoff_multiplier = 1;
                    tracing::info!(enriched = progress.enriched, errors = progress.errors, "AI processor cycle completed");
                    self.health.set("ai_processor", ComponentStatus::Healthy);
                }
                Ok(progress) if progress.errors > 0 => {
                    consecutive_empty_with_errors += 1;
                    if consecutive_empty_with_errors >= 2 {
                        backoff_multiplier = (backoff_multiplier * 2).min(8);
                    }
                    tracing::warn!(errors = progress.errors, backoff_multiplier, "AI processor cycle made no progress");
                    self.health.set("ai_processor", ComponentStatus::Degraded);
                }
                Ok(_) => {
                    consecutive_empty_with_errors = 0;
                    backoff_multiplier = 1;
                    self.health.set("ai_processor", ComponentStatus::Healthy);
                }
                Err(e) => {
                    tracing::warn!(?e, "AI processor cycle failed");
                    self.health.set("ai_processor", ComponentStatus::Unhealthy);
                }
            }
        }
    }

    pub async fn run_cycle(&self, queue_depth: i64) -> Result<CycleProgress, CoreError> {
        let claimed = self.store.claim_pending_for_ai(adaptive_batch_size(queue_depth, &self.config)).await?;
        if claimed.is_empty() {
            return Ok(CycleProgress::default());
        }

        let mut loaded = Vec::with_capacity(claimed.len());
        for article_ref in &claimed {
            match self.store.get_article(article_ref.id).await? {
                Some(article) => loaded.push(article),
                None => continue,
            }
        }

        let mut progress = CycleProgress::default();
        let stock_worthy_ids;

        if loaded.len() >= self.config.batch_threshold {
            let items: Vec<ArticleText> = loaded
                .iter()
                .map(|a| ArticleText { title: a.title.clone(), text: a.content.clone().unwrap_or_else(|| a.summary.clone()) })
                .collect();

            match self.llm.process_batch(&items).await {
                Ok(enrichments) => {
                    let mut ids = Vec::new();
                    for (article, enrichment) in loaded.iter().zip(enrichments.into_iter()) {
                        self.store.write_enrichment(article.id, &enrichment).await?;
                        progress.enriched += 1;
                        if !enrichment.stock_tickers.is_empty() {
                            ids.push(article.id);
                        }
                    }
                    stock_worthy_ids = ids;
                }
                Err(e) => {
                    for article in &loaded {
                        self.store.clear_ai_lock(article.id, &e.to_string(), self.config.max_attempts_per_article).await?;
                    }
                    progress.errors += loaded.len();
                    stock_worthy_ids = Vec::new();
                }
            }
        } else {
            let worker_count = self.config.worker_count.max(1);
            let mut ids = Vec::new();
            for batch in loaded.chunks(worker_count) {
                let results = futures::future::join_all(batch.iter().map(|article| {
                    let text = article.content.clone().unwrap_or_else(|| article.summary.clone());
                    self.llm.process_one(&article.title, &text)
                }))
                .await;

                for (article, result) in batch.iter().zip(results.into_iter()) {
                    match result {
                        Ok(enrichment) => {
                            self.store.write_enrichment(article.id, &enrichment).await?;
                            progress.enriched += 1;
                            if !enrichment.stock_tickers.is_empty() {
                                ids.push(article.id);
                            }
                        }
                        Err(e) => {
                            self.store.clear_ai_lock(article.id, &e.to_string(), self.config.max_attempts_per_article).await?;
                            progress.errors += 1;
                        }
                    }
                }
            }
            stock_worthy_ids = ids;
        }

        if progress.enriched > 0 {
            self.cache.invalidate_tag(Tag::ArticlesList).await;
            self.cache.invalidate_tag(Tag::ArticlesStats).await;
            for article in &loaded {
                self.cache.invalidate_key(&crate::cache::keys::articles_get(article.id)).await;
                self.cache.invalidate_key(&crate::cache::keys::articles_enrichment(article.id)).await;
            }
        }

        if !stock_worthy_ids.is_empty() {
            if let Some(tx) = &self.stock_notify {
                let _ = tx.send(stock_worthy_ids.clone());
            }
        }
        progress.stock_worthy_ids = stock_worthy_ids;
        Ok(progress)
    }

    /// Forces enrichment of one article outside the normal claim cadence
    /// (admin `POST /articles/{id}/process`). Bypasses the soft-lock claim
    /// entirely since the caller already knows which article it wants.
    pub async fn process_one_article(&self, article_id: i64) -> Result<(), CoreError> {
        let article = self
            .store
            .get_article(article_id)
            .await?
            .ok_or_else(|| CoreError::Permanent(format!("article {article_id} not found")))?;
        let text = article.content.clone().unwrap_or_else(|| article.summary.clone());

        match self.llm.process_one(&article.title, &text).await {
            Ok(enrichment) => {
                self.store.write_enrichment(article.id, &enrichment).await?;
                self.cache.invalidate_tag(Tag::ArticlesList).await;
                self.cache.invalidate_tag(Tag::ArticlesStats).await;
                self.cache.invalidate_key(&crate::cache::keys::articles_get(article.id)).await;
                self.cache.invalidate_key(&crate::cache::keys::articles_enrichment(article.id)).await;
                if !enrichment.stock_tickers.is_empty() {
                    if let Some(tx) = &self.stock_notify {
                        let _ = tx.send(vec![article.id]);
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.store.clear_ai_lock(article.id, &e.to_string(), self.config.max_attempts_per_article).await?;
                Err(e)
            }
        }
    }
}

#[derive(Debug, Default, serde::Serialize)]
pub struct CycleProgress {
    pub enriched: usize,
    pub errors: usize,
    pub stock_worthy_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;

    fn config() -> AiConfig {
        AiConfig {
            enabled: true,
            enable_summary: true,
            min_interval_sec: 60,
            max_interval_sec: 1800,
            worker_count: 4,
            batch_threshold: 3,
            batch_size: 20,
            llm_timeout_sec: 30,
            max_attempts_per_article: 3,
            model: "gpt".into(),
            api_base: None,
            api_key: None,
        }
    }

    #[test]
    fn interval_follows_step_function() {
        let c = config();
        assert_eq!(interval_for_queue_depth(0, &c), Duration::from_secs(600));
        assert_eq!(interval_for_queue_depth(10, &c), Duration::from_secs(300));
        assert_eq!(interval_for_queue_depth(50, &c), Duration::from_secs(120));
        assert_eq!(interval_for_queue_depth(500, &c), Duration::from_secs(60));
    }

    #[test]
    fn batch_size_is_bounded_by_config() {
        let c = config();
        assert_eq!(adaptive_batch_size(3, &c), 3);
        assert_eq!(adaptive_batch_size(1000, &c), 20);
        assert_eq!(adaptive_batch_size(0, &c), 1);
    }
}
