use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::sources;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, serde::Deserialize)]
#[diesel(table_name = sources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub domain: String,
    pub feed_url: Option<String>,
    pub use_rss: bool,
    pub use_browser_fallback: bool,
    pub is_active: bool,
    pub rate_limit_sec: i32,
    pub max_articles_per_scrape: i32,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub total_articles_scraped: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sources)]
pub struct NewSource<'a> {
    pub name: &'a str,
    pub domain: &'a str,
    pub feed_url: Option<&'a str>,
    pub use_rss: bool,
    pub use_browser_fallback: bool,
    pub rate_limit_sec: i32,
    pub max_articles_per_scrape: i32,
}
