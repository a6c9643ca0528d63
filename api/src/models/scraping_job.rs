use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::scraping_jobs;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, serde::Deserialize)]
#[diesel(table_name = scraping_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScrapingJob {
    pub id: i64,
    pub job_uuid: Uuid,
    pub source: String,
    pub method: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    pub articles_found: i32,
    pub articles_new: i32,
    pub articles_updated: i32,
    pub articles_skipped: i32,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scraping_jobs)]
pub struct NewScrapingJob {
    pub job_uuid: Uuid,
    pub source: String,
    pub method: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub max_retries: i32,
}
