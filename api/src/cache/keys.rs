//! Versioned key schema: every key is prefixed `v1:` so a future
//! incompatible change can run alongside the old generation during rollout.

use sha2::{Digest, Sha256};
use std::time::Duration;

const PREFIX: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    ArticlesList,
    ArticlesStats,
    Analytics,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::ArticlesList => "articles-list",
            Tag::ArticlesStats => "articles-stats",
            Tag::Analytics => "analytics",
        }
    }
}

pub fn hash_filter(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())[..16].to_string()
}

pub fn articles_list(filter_sort_page_hash: &str) -> String {
    format!("{PREFIX}:articles:list:{filter_sort_page_hash}")
}

pub fn articles_get(id: i64) -> String {
    format!("{PREFIX}:articles:get:{id}")
}

pub fn articles_enrichment(id: i64) -> String {
    format!("{PREFIX}:articles:enrichment:{id}")
}

pub fn articles_stats() -> String {
    format!("{PREFIX}:articles:stats")
}

pub fn analytics_trending(hours: i64, min_articles: i64, limit: i64) -> String {
    format!("{PREFIX}:analytics:trending:{hours}:{min_articles}:{limit}")
}

pub fn analytics_sentiment(source: Option<&str>, range_hours: i64) -> String {
    format!("{PREFIX}:analytics:sentiment:{}:{range_hours}", source.unwrap_or("*"))
}

pub fn llm_response(normalized_prompt_hash: &str) -> String {
    format!("{PREFIX}:llm:resp:{normalized_prompt_hash}")
}

pub fn stock_quote(symbol: &str) -> String {
    format!("{PREFIX}:stock:quote:{}", symbol.to_uppercase())
}

pub fn stock_profile(symbol: &str) -> String {
    format!("{PREFIX}:stock:profile:{}", symbol.to_uppercase())
}

pub const LIST_TTL: Duration = Duration::from_secs(5 * 60);
pub const GET_TTL: Duration = Duration::from_secs(5 * 60);
pub const ENRICHMENT_TTL: Duration = Duration::from_secs(5 * 60);
pub const STATS_TTL: Duration = Duration::from_secs(2 * 60);
pub const TRENDING_TTL: Duration = Duration::from_secs(60);
pub const SENTIMENT_TTL: Duration = Duration::from_secs(5 * 60);
pub const LLM_RESPONSE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const QUOTE_TTL: Duration = Duration::from_secs(5 * 60);
pub const PROFILE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_schema_is_versioned_and_stable() {
        assert_eq!(articles_get(42), "v1:articles:get:42");
        assert_eq!(stock_quote("asml"), "v1:stock:quote:ASML");
    }

    #[test]
    fn hash_filter_is_deterministic() {
        let a = hash_filter(&["nos.nl", "published", "desc"]);
        let b = hash_filter(&["nos.nl", "published", "desc"]);
        assert_eq!(a, b);
        let c = hash_filter(&["nu.nl", "published", "desc"]);
        assert_ne!(a, c);
    }
}
