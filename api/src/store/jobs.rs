use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::scraping_job::ScrapingJob;
use crate::schema::scraping_jobs;

use super::Store;

impl Store {
    /// Opens a ScrapingJob in `running` state; the job is
    /// later finalized via `record_job`.
    pub async fn open_job(&self, source: &str, method: &str, max_retries: i32) -> Result<(i64, Uuid), CoreError> {
        let mut conn = self.pool().get().await?;
        let job_uuid = Uuid::new_v4();
        let new_job = crate::models::scraping_job::NewScrapingJob {
            job_uuid,
            source: source.to_string(),
            method: method.to_string(),
            status: "running".to_string(),
            started_at: Utc::now(),
            max_retries,
        };
        let id: i64 = diesel::insert_into(scraping_jobs::table)
            .values(&new_job)
            .returning(scraping_jobs::id)
            .get_result(&mut conn)
            .await?;
        Ok((id, job_uuid))
    }

    pub async fn recent_jobs(&self, source: Option<&str>, limit: i64) -> Result<Vec<ScrapingJob>, CoreError> {
        let mut conn = self.pool().get().await?;
        let mut query = scraping_jobs::table.into_boxed();
        if let Some(source) = source {
            query = query.filter(scraping_jobs::source.eq(source));
        }
        Ok(query
            .order(scraping_jobs::started_at.desc())
            .limit(limit.clamp(1, 100))
            .load(&mut conn)
            .await?)
    }
}
