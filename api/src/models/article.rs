use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::articles;

/// A scraped and (eventually) enriched news article. Mirrors `articles` 1:1;
/// the `ai_*`/`content_*` lock columns implement the soft-lock claim pattern
/// used by `ClaimPendingForAI`/`ClaimPendingForContent`.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, serde::Deserialize)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub content: Option<String>,
    pub url: String,
    pub content_hash: Option<String>,
    pub published: DateTime<Utc>,
    pub source: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub keywords: Vec<String>,
    pub image_url: Option<String>,
    pub content_extracted: bool,
    pub content_extracted_at: Option<DateTime<Utc>>,
    pub content_lock_at: Option<DateTime<Utc>>,
    pub content_attempts: i32,
    pub ai_processed: bool,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub ai_lock_at: Option<DateTime<Utc>>,
    pub ai_attempts: i32,
    pub ai_sentiment: Option<f64>,
    pub ai_sentiment_label: Option<String>,
    pub ai_summary: Option<String>,
    pub ai_categories: Option<serde_json::Value>,
    pub ai_entities: Option<serde_json::Value>,
    pub ai_keywords: Option<serde_json::Value>,
    pub ai_stock_tickers: Option<serde_json::Value>,
    pub ai_error: Option<String>,
    pub stock_data: Option<serde_json::Value>,
    pub stock_data_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = articles)]
pub struct NewArticle {
    pub title: String,
    pub summary: String,
    pub content: Option<String>,
    pub url: String,
    pub content_hash: Option<String>,
    pub published: DateTime<Utc>,
    pub source: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub keywords: Vec<String>,
    pub image_url: Option<String>,
}
