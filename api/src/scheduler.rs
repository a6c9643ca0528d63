//! Owns every periodic subsystem task behind one `CancellationToken`,
//! driving the scrape/AI/backfill/inbox/analytics loops from a single
//! shared scheduler instead of one ticker per subsystem.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ai::AIProcessor;
use crate::backfill::ContentBackfill;
use crate::cache::{Cache, Tag};
use crate::inbox::InboxIngestor;
use crate::scrape::ScrapeOrchestrator;
use crate::stocks::StockEnricher;
use crate::store::Store;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub struct Scheduler {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { cancel: CancellationToken::new(), handles: Vec::new() }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn_scrape_ticker(&mut self, orchestrator: Arc<ScrapeOrchestrator>, interval: Duration) {
        let cancel = self.cancel.clone();
        self.handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("scrape ticker stopping");
                        return;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
                match orchestrator.run(None).await {
                    Ok(summary) => tracing::info!(?summary, "scheduled scrape run completed"),
                    Err(e) => tracing::warn!(?e, "scheduled scrape run failed"),
                }
            }
        }));
    }

    pub fn spawn_ai_processor(&mut self, processor: Arc<AIProcessor>) {
        let cancel = self.cancel.clone();
        self.handles.push(tokio::spawn(async move { processor.run_loop(cancel).await }));
    }

    pub fn spawn_content_backfill(&mut self, backfill: Arc<ContentBackfill>) {
        let cancel = self.cancel.clone();
        self.handles.push(tokio::spawn(async move { backfill.run_loop(cancel).await }));
    }

    pub fn spawn_inbox_ingestor(&mut self, ingestor: Arc<InboxIngestor>) {
        let cancel = self.cancel.clone();
        self.handles.push(tokio::spawn(async move { ingestor.run_loop(cancel).await }));
    }

    pub fn spawn_stock_enricher(&mut self, enricher: Arc<StockEnricher>, rx: tokio::sync::mpsc::UnboundedReceiver<Vec<i64>>) {
        let cancel = self.cancel.clone();
        self.handles.push(tokio::spawn(async move { enricher.run_loop(rx, cancel).await }));
    }

    pub fn spawn_analytics_refresher(&mut self, store: Store, cache: Arc<Cache>, interval: Duration) {
        let cancel = self.cancel.clone();
        self.handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("analytics refresher stopping");
                        return;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
                match store.refresh_analytics(true).await {
                    Ok(results) => {
                        tracing::info!(?results, "materialized views refreshed");
                        cache.invalidate_tag(Tag::Analytics).await;
                    }
                    Err(e) => tracing::warn!(?e, "materialized view refresh failed"),
                }
            }
        }));
    }

    /// Cancels every loop and waits up to `SHUTDOWN_GRACE` for in-flight
    /// work to finish before the handles are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let join_all = futures::future::join_all(self.handles);
        if tokio::time::timeout(SHUTDOWN_GRACE, join_all).await.is_err() {
            tracing::warn!("scheduler shutdown grace period elapsed with tasks still running");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
