use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

/// A single configured Dutch news source (bootstrap config, not the DB row).
#[derive(Clone, Debug)]
pub struct TargetSite {
    pub name: String,
    pub domain: String,
    pub feed_url: Option<String>,
    pub use_rss: bool,
    pub use_browser_fallback: bool,
}

#[derive(Clone, Debug)]
pub struct ScrapingConfig {
    pub target_sites: Vec<TargetSite>,
    pub schedule_interval_min: u64,
    pub rate_limit_sec: u64,
    pub max_concurrent_sources: usize,
    pub max_articles_per_scrape: usize,
    pub enable_browser_fallback: bool,
    pub enable_robots_txt_check: bool,
}

#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub pool_size: usize,
    pub max_concurrent: usize,
    pub timeout_sec: u64,
    pub wait_after_load_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ContentBackfillConfig {
    pub enabled: bool,
    pub interval_min: u64,
    pub batch_size: i64,
    pub delay_sec: u64,
    pub max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub enabled: bool,
    pub enable_summary: bool,
    pub min_interval_sec: u64,
    pub max_interval_sec: u64,
    pub worker_count: usize,
    pub batch_threshold: usize,
    pub batch_size: i64,
    pub llm_timeout_sec: u64,
    pub max_attempts_per_article: u32,
    pub model: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub l1_max_entries: usize,
    pub redis_url: Option<String>,
    pub list_ttl: Duration,
    pub get_ttl: Duration,
    pub enrichment_ttl: Duration,
    pub stats_ttl: Duration,
    pub trending_ttl: Duration,
    pub sentiment_ttl: Duration,
    pub llm_response_ttl: Duration,
    pub quote_ttl: Duration,
    pub profile_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct StocksConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub cache_ttl_min: u64,
    pub rate_limit_per_min: u32,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub enabled: bool,
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub allowed_senders: Vec<String>,
    pub poll_interval_min: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub admin_key: Option<String>,
    pub global_rate_limit_per_min: u32,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub env: Env,
    pub scraping: ScrapingConfig,
    pub browser: BrowserConfig,
    pub backfill: ContentBackfillConfig,
    pub ai: AiConfig,
    pub cache: CacheConfig,
    pub stocks: StocksConfig,
    pub email: EmailConfig,
    pub api: ApiConfig,
    pub database_url: String,
}

fn var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) => Some(v),
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            tracing::warn!(%key, "environment variable is not valid unicode");
            None
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_string())
}

fn var_bool(key: &str, default: bool) -> bool {
    match var(key) {
        Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn var_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn required_var(key: &str) -> String {
    match var(key) {
        Some(v) => v,
        None => {
            tracing::error!(%key, "required environment variable is missing");
            std::process::exit(1);
        }
    }
}

/// Parses the `TARGET_SITES` variable: `name|domain|feed_url|rss|browser;...`
fn parse_target_sites(raw: &str) -> Vec<TargetSite> {
    raw.split(';')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.split('|').collect();
            if parts.len() < 2 {
                tracing::warn!(entry, "malformed TARGET_SITES entry, skipping");
                return None;
            }
            Some(TargetSite {
                name: parts[0].trim().to_string(),
                domain: parts[1].trim().to_lowercase(),
                feed_url: parts.get(2).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
                use_rss: parts.get(3).map(|s| s.trim() == "true").unwrap_or(true),
                use_browser_fallback: parts.get(4).map(|s| s.trim() == "true").unwrap_or(false),
            })
        })
        .collect()
}

fn default_target_sites() -> Vec<TargetSite> {
    // A small, fixed set of Dutch news sites, matching the purpose/scope in
    // Overridable via TARGET_SITES.
    vec![
        TargetSite {
            name: "NOS".into(),
            domain: "nos.nl".into(),
            feed_url: Some("https://feeds.nos.nl/nosnieuwsalgemeen".into()),
            use_rss: true,
            use_browser_fallback: true,
        },
        TargetSite {
            name: "NU.nl".into(),
            domain: "nu.nl".into(),
            feed_url: Some("https://www.nu.nl/rss/Algemeen".into()),
            use_rss: true,
            use_browser_fallback: false,
        },
        TargetSite {
            name: "Volkskrant".into(),
            domain: "volkskrant.nl".into(),
            feed_url: Some("https://www.volkskrant.nl/voorpagina/rss.xml".into()),
            use_rss: true,
            use_browser_fallback: true,
        },
    ]
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let env = match var("ENVIRONMENT").as_deref() {
            Some("staging") => Env::Staging,
            Some("production") => Env::Production,
            _ => Env::Dev,
        };

        let target_sites = var("TARGET_SITES")
            .map(|raw| parse_target_sites(&raw))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_target_sites);

        ServerConfig {
            env,
            database_url: required_var("DATABASE_URL"),
            scraping: ScrapingConfig {
                target_sites,
                schedule_interval_min: var_num("SCRAPER_SCHEDULE_INTERVAL_MIN", 15),
                rate_limit_sec: var_num("SCRAPER_RATE_LIMIT_SEC", 5),
                max_concurrent_sources: var_num("SCRAPER_MAX_CONCURRENT_SOURCES", 4),
                max_articles_per_scrape: var_num("SCRAPER_MAX_ARTICLES_PER_SCRAPE", 25),
                enable_browser_fallback: var_bool("ENABLE_BROWSER_FALLBACK", true),
                enable_robots_txt_check: var_bool("ENABLE_ROBOTS_TXT_CHECK", true),
            },
            browser: BrowserConfig {
                pool_size: var_num("BROWSER_POOL_SIZE", 3),
                max_concurrent: var_num("BROWSER_MAX_CONCURRENT", 2),
                timeout_sec: var_num("BROWSER_TIMEOUT_SEC", 30),
                wait_after_load_ms: var_num("BROWSER_WAIT_AFTER_LOAD_MS", 1500),
            },
            backfill: ContentBackfillConfig {
                enabled: var_bool("ENABLE_CONTENT_BACKFILL", true),
                interval_min: var_num("CONTENT_BACKFILL_INTERVAL_MIN", 10),
                batch_size: var_num("CONTENT_BATCH_SIZE", 20),
                delay_sec: var_num("CONTENT_DELAY_SEC", 2),
                max_attempts: var_num("CONTENT_MAX_ATTEMPTS", 3),
            },
            ai: AiConfig {
                enabled: var_bool("ENABLE_AI", true),
                enable_summary: var_bool("AI_ENABLE_SUMMARY", true),
                min_interval_sec: var_num("AI_PROCESSOR_MIN_INTERVAL_SEC", 60),
                max_interval_sec: var_num("AI_PROCESSOR_MAX_INTERVAL_SEC", 600),
                worker_count: var_num("AI_WORKER_COUNT", 4),
                batch_threshold: var_num("AI_BATCH_THRESHOLD", 3),
                batch_size: var_num("AI_BATCH_SIZE", 10),
                llm_timeout_sec: var_num("AI_LLM_TIMEOUT_SEC", 30),
                max_attempts_per_article: var_num("AI_MAX_ATTEMPTS_PER_ARTICLE", 3),
                model: var_or("AI_MODEL", "gpt-4o-mini"),
                api_base: var("AI_API_BASE"),
                api_key: var("AI_API_KEY"),
            },
            cache: CacheConfig {
                l1_max_entries: var_num("CACHE_L1_MAX_ENTRIES", 10_000),
                redis_url: var("CACHE_REDIS_URL"),
                list_ttl: Duration::from_secs(5 * 60),
                get_ttl: Duration::from_secs(5 * 60),
                enrichment_ttl: Duration::from_secs(5 * 60),
                stats_ttl: Duration::from_secs(2 * 60),
                trending_ttl: Duration::from_secs(60),
                sentiment_ttl: Duration::from_secs(5 * 60),
                llm_response_ttl: Duration::from_secs(24 * 60 * 60),
                quote_ttl: Duration::from_secs(5 * 60),
                profile_ttl: Duration::from_secs(24 * 60 * 60),
            },
            stocks: StocksConfig {
                enabled: var_bool("ENABLE_STOCKS", false),
                api_key: var("STOCK_API_KEY"),
                cache_ttl_min: var_num("STOCK_CACHE_TTL_MIN", 5),
                rate_limit_per_min: var_num("STOCK_RATE_LIMIT_PER_MIN", 5),
            },
            email: EmailConfig {
                enabled: var_bool("ENABLE_EMAIL", false),
                server: var("EMAIL_IMAP_SERVER"),
                username: var("EMAIL_USERNAME"),
                password: var("EMAIL_PASSWORD"),
                allowed_senders: var("EMAIL_ALLOWED_SENDERS")
                    .map(|s| s.split(',').map(|s| s.trim().to_lowercase()).collect())
                    .unwrap_or_default(),
                poll_interval_min: var_num("EMAIL_POLL_INTERVAL_MIN", 5),
                max_retries: var_num("EMAIL_MAX_RETRIES", 3),
            },
            api: ApiConfig {
                bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
                admin_key: var("ADMIN_KEY"),
                global_rate_limit_per_min: var_num("GLOBAL_RATE_LIMIT_PER_MIN", 600),
            },
        }
    }
}
