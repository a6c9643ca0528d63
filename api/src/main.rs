mod ai;
mod app;
mod backfill;
mod cache;
mod config;
mod error;
mod health;
mod http;
mod inbox;
mod models;
mod retry;
mod schema;
mod scheduler;
mod scrape;
mod store;
mod stocks;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::ai::{AIProcessor, LlmWrapper, OpenAiLlmClient};
use crate::app::App;
use crate::backfill::ContentBackfill;
use crate::cache::Cache;
use crate::config::ServerConfig;
use crate::health::HealthRegistry;
use crate::inbox::{ImapInboxClient, InboxClient, InboxIngestor};
use crate::models::source::NewSource;
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;
use crate::scrape::ScrapeOrchestrator;
use crate::stocks::{AlphaVantageProvider, StockEnricher};
use crate::store::Store;

#[cfg(feature = "browser-fallback")]
use crate::scrape::browser_extract::BrowserExtractor;
#[cfg(feature = "browser-fallback")]
use crate::scrape::browser_pool::BrowserPool;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(ServerConfig::new_from_env());

    run_migrations(&config.database_url);
    let pool = Store::connect(&config.database_url).expect("couldn't build the database pool");
    let store = Store::new(pool);

    for site in &config.scraping.target_sites {
        let new_source = NewSource {
            name: &site.name,
            domain: &site.domain,
            feed_url: site.feed_url.as_deref(),
            use_rss: site.use_rss,
            use_browser_fallback: site.use_browser_fallback,
            rate_limit_sec: config.scraping.rate_limit_sec as i32,
            max_articles_per_scrape: config.scraping.max_articles_per_scrape as i32,
        };
        if let Err(e) = store.upsert_source(new_source).await {
            tracing::warn!(source = %site.domain, ?e, "failed to seed source");
        }
    }

    let cache = Arc::new(Cache::connect(config.cache.l1_max_entries, config.cache.redis_url.as_deref()).await);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("couldn't build the shared HTTP client");

    let health = Arc::new(HealthRegistry::new());

    #[cfg(feature = "browser-fallback")]
    let browser = if config.scraping.enable_browser_fallback {
        match BrowserPool::new(config.browser.pool_size).await {
            Ok(pool) => Some(Arc::new(BrowserExtractor::new(
                Arc::new(pool),
                config.browser.max_concurrent,
                Duration::from_millis(config.browser.wait_after_load_ms),
                health.clone(),
            ))),
            Err(e) => {
                tracing::warn!(?e, "failed to start the browser pool, falling back to HTML-only extraction");
                None
            }
        }
    } else {
        None
    };

    let (stock_notify_tx, stock_notify_rx) = tokio::sync::mpsc::unbounded_channel();

    let ai = if config.ai.enabled {
        let client: Arc<dyn crate::ai::LLMClient> = Arc::new(OpenAiLlmClient::new(
            http.clone(),
            config.ai.api_base.clone().unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            config.ai.api_key.clone(),
            config.ai.model.clone(),
            Duration::from_secs(config.ai.llm_timeout_sec),
        ));
        let llm = LlmWrapper::new(client, cache.clone(), RetryPolicy::new(3, Duration::from_secs(1)));
        Some(Arc::new(AIProcessor::new(
            store.clone(),
            cache.clone(),
            llm,
            config.ai.clone(),
            Some(stock_notify_tx),
            health.clone(),
        )))
    } else {
        None
    };

    #[cfg(feature = "browser-fallback")]
    let scrape = Arc::new(ScrapeOrchestrator::new(
        store.clone(),
        cache.clone(),
        http.clone(),
        config.scraping.clone(),
        browser.clone(),
    ));
    #[cfg(not(feature = "browser-fallback"))]
    let scrape = Arc::new(ScrapeOrchestrator::new(store.clone(), cache.clone(), http.clone(), config.scraping.clone()));

    #[cfg(feature = "browser-fallback")]
    let backfill = Arc::new(ContentBackfill::new(store.clone(), http.clone(), config.backfill.clone(), browser.clone()));
    #[cfg(not(feature = "browser-fallback"))]
    let backfill = Arc::new(ContentBackfill::new(store.clone(), http.clone(), config.backfill.clone()));

    let inbox = if config.email.enabled {
        match (&config.email.server, &config.email.username, &config.email.password) {
            (Some(server), Some(username), Some(password)) => {
                let client: Arc<dyn InboxClient> =
                    Arc::new(ImapInboxClient::new(server.clone(), 993, username.clone(), password.clone()));
                Some(Arc::new(InboxIngestor::new(store.clone(), client, config.email.clone(), health.clone())))
            }
            _ => {
                tracing::warn!("email ingestion enabled but IMAP credentials are incomplete, skipping");
                None
            }
        }
    } else {
        None
    };

    let stocks = if config.stocks.enabled {
        let provider: Arc<dyn crate::stocks::QuoteProvider> = Arc::new(AlphaVantageProvider::new(
            http.clone(),
            config.stocks.api_key.clone().unwrap_or_default(),
            Duration::from_secs(10),
        ));
        Some(Arc::new(StockEnricher::new(store.clone(), cache.clone(), provider, health.clone())))
    } else {
        None
    };

    let mut scheduler = Scheduler::new();
    scheduler.spawn_scrape_ticker(scrape.clone(), Duration::from_secs(config.scraping.schedule_interval_min * 60));
    scheduler.spawn_content_backfill(backfill);
    if let Some(ai) = &ai {
        scheduler.spawn_ai_processor(ai.clone());
    }
    if let Some(inbox) = inbox {
        scheduler.spawn_inbox_ingestor(inbox);
    }
    if let Some(stocks) = stocks {
        scheduler.spawn_stock_enricher(stocks, stock_notify_rx);
    }
    scheduler.spawn_analytics_refresher(store.clone(), cache.clone(), Duration::from_secs(15 * 60));

    #[cfg(feature = "browser-fallback")]
    let app = App::new(store, cache, http, health, config.clone(), scrape, ai, browser);
    #[cfg(not(feature = "browser-fallback"))]
    let app = App::new(store, cache, http, health, config.clone(), scrape, ai);

    let router = http::router(app);

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("couldn't bind {}: {e}", config.api.bind_addr));
    tracing::info!(addr = %config.api.bind_addr, "listening");

    let shutdown_scheduler = scheduler;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown_scheduler.shutdown().await;
        })
        .await
        .expect("server error");
}

fn run_migrations(database_url: &str) {
    use diesel::Connection;
    let mut conn = diesel::pg::PgConnection::establish(database_url)
        .unwrap_or_else(|e| panic!("couldn't connect to {database_url} to run migrations: {e}"));
    conn.run_pending_migrations(MIGRATIONS).expect("failed to run pending migrations");
}
