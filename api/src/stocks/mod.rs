//! Resolves tickers the AIProcessor detected into live quotes and writes
//! them back onto the affected articles. Best-effort: a
//! provider failure never marks an article as failed.

pub mod provider;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::keys;
use crate::error::CoreError;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::store::Store;

pub use provider::{AlphaVantageProvider, Profile, Quote, QuoteProvider};

const DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

pub struct StockEnricher {
    store: Store,
    cache: Arc<crate::cache::Cache>,
    provider: Arc<dyn QuoteProvider>,
    health: Arc<HealthRegistry>,
}

impl StockEnricher {
    pub fn new(
        store: Store,
        cache: Arc<crate::cache::Cache>,
        provider: Arc<dyn QuoteProvider>,
        health: Arc<HealthRegistry>,
    ) -> Self {
        Self { store, cache, provider, health }
    }

    /// Drains `rx` for article ids flagged by `WriteEnrichment`, coalescing
    /// everything that arrives within a debounce window into one
    /// `QuoteProvider.Quotes` call.
    pub async fn run_loop(&self, mut rx: mpsc::UnboundedReceiver<Vec<i64>>, cancel: CancellationToken) {
        loop {
            let first_batch = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("stock enricher stopping");
                    return;
                }
                batch = rx.recv() => match batch {
                    Some(b) => b,
                    None => return,
                },
            };

            let mut article_ids: HashSet<i64> = first_batch.into_iter().collect();
            let deadline = tokio::time::Instant::now() + DEBOUNCE_WINDOW;
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, rx.recv()).await {
                    Ok(Some(more)) => article_ids.extend(more),
                    Ok(None) | Err(_) => break,
                }
            }

            match self.enrich_batch(article_ids.into_iter().collect()).await {
                Ok(()) => self.health.set("stock_enricher", ComponentStatus::Healthy),
                Err(e) => {
                    tracing::warn!(?e, "stock enrichment batch failed");
                    self.health.set("stock_enricher", ComponentStatus::Degraded);
                }
            }
        }
    }

    pub async fn enrich_batch(&self, article_ids: Vec<i64>) -> Result<(), CoreError> {
        let mut per_article_symbols: HashMap<i64, Vec<String>> = HashMap::new();
        let mut all_symbols: HashSet<String> = HashSet::new();

        for id in &article_ids {
            let Some(article) = self.store.get_article(*id).await? else { continue };
            let Some(tickers) = article.ai_stock_tickers else { continue };
            let symbols: Vec<String> = serde_json::from_value::<Vec<crate::ai::types::StockTicker>>(tickers)
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.symbol.to_uppercase())
                .collect();
            if symbols.is_empty() {
                continue;
            }
            all_symbols.extend(symbols.iter().cloned());
            per_article_symbols.insert(*id, symbols);
        }

        if all_symbols.is_empty() {
            return Ok(());
        }

        let mut quotes: HashMap<String, Quote> = HashMap::new();
        let mut misses = Vec::new();
        for symbol in &all_symbols {
            match self.cache.get::<Quote>(&keys::stock_quote(symbol)).await {
                Some(q) => {
                    quotes.insert(symbol.clone(), q);
                }
                None => misses.push(symbol.clone()),
            }
        }

        if !misses.is_empty() {
            match self.provider.quotes(&misses).await {
                Ok(fetched) => {
                    for (symbol, quote) in fetched {
                        self.cache.set(&keys::stock_quote(&symbol), &quote, keys::QUOTE_TTL).await;
                        quotes.insert(symbol, quote);
                    }
                }
                Err(e) => {
                    // best-effort: provider down doesn't fail the articles,
                    // we just skip writing stock_data for the miss symbols
                    tracing::warn!(?e, symbols = ?misses, "quote provider call failed");
                }
            }
        }

        for (article_id, symbols) in per_article_symbols {
            let article_quotes: HashMap<&String, &Quote> =
                symbols.iter().filter_map(|s| quotes.get(s).map(|q| (s, q))).collect();
            if article_quotes.is_empty() {
                continue;
            }
            let value = serde_json::to_value(&article_quotes).unwrap_or(serde_json::Value::Null);
            if let Err(e) = self.store.write_stock_data(article_id, value).await {
                tracing::warn!(%article_id, ?e, "failed to write stock data");
            }
        }

        Ok(())
    }
}
