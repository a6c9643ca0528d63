use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::error::CoreError;
use crate::models::source::{NewSource, Source};
use crate::schema::sources;

use super::Store;

const MAX_CONSECUTIVE_FAILURES: i32 = 5;

impl Store {
    pub async fn upsert_source(&self, new_source: NewSource<'_>) -> Result<Source, CoreError> {
        let mut conn = self.pool().get().await?;
        let row = diesel::insert_into(sources::table)
            .values(&new_source)
            .on_conflict(sources::domain)
            .do_update()
            .set((
                sources::name.eq(new_source.name),
                sources::feed_url.eq(new_source.feed_url),
                sources::use_rss.eq(new_source.use_rss),
                sources::use_browser_fallback.eq(new_source.use_browser_fallback),
            ))
            .get_result(&mut conn)
            .await?;
        Ok(row)
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>, CoreError> {
        let mut conn = self.pool().get().await?;
        Ok(sources::table.order(sources::name.asc()).load(&mut conn).await?)
    }

    /// Active sources due for a scrape: last run older than `rate_limit_sec`
    /// and not tripped past the circuit-breaker failure threshold.
    pub async fn sources_ready_to_scrape(&self) -> Result<Vec<Source>, CoreError> {
        let mut conn = self.pool().get().await?;
        let rows: Vec<Source> = sources::table
            .filter(sources::is_active.eq(true))
            .filter(sources::consecutive_failures.lt(MAX_CONSECUTIVE_FAILURES))
            .load(&mut conn)
            .await?;
        let now = Utc::now();
        Ok(rows
            .into_iter()
            .filter(|s| match s.last_scraped_at {
                None => true,
                Some(last) => (now - last).num_seconds() >= s.rate_limit_sec as i64,
            })
            .collect())
    }

    /// Finalizes a ScrapingJob opened via `Store::open_job` and updates the
    /// owning source's counters in the same transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_job(
        &self,
        job_id: i64,
        source_domain: String,
        status: &str,
        articles_found: i32,
        articles_new: i32,
        articles_updated: i32,
        articles_skipped: i32,
        error: Option<String>,
        error_code: Option<String>,
    ) -> Result<(), CoreError> {
        use diesel_async::scoped_futures::ScopedFutureExt;
        let mut conn = self.pool().get().await?;
        let succeeded = status == "completed";

        conn.transaction(|conn| {
                async move {
                    let now = Utc::now();
                    let started_at: chrono::DateTime<Utc> = crate::schema::scraping_jobs::table
                        .find(job_id)
                        .select(crate::schema::scraping_jobs::started_at)
                        .get_result(conn)
                        .await?;
                    let execution_time_ms = (now - started_at).num_milliseconds().max(0);

                    diesel::update(crate::schema::scraping_jobs::table.find(job_id))
                        .set((
                            crate::schema::scraping_jobs::status.eq(status),
                            crate::schema::scraping_jobs::completed_at.eq(now),
                            crate::schema::scraping_jobs::execution_time_ms.eq(execution_time_ms),
                            crate::schema::scraping_jobs::articles_found.eq(articles_found),
                            crate::schema::scraping_jobs::articles_new.eq(articles_new),
                            crate::schema::scraping_jobs::articles_updated.eq(articles_updated),
                            crate::schema::scraping_jobs::articles_skipped.eq(articles_skipped),
                            crate::schema::scraping_jobs::error.eq(&error),
                            crate::schema::scraping_jobs::error_code.eq(&error_code),
                        ))
                        .execute(conn)
                        .await?;

                    if succeeded {
                        diesel::update(sources::table.filter(sources::domain.eq(&source_domain)))
                            .set((
                                sources::last_scraped_at.eq(now),
                                sources::last_success_at.eq(now),
                                sources::consecutive_failures.eq(0),
                                sources::total_articles_scraped.eq(sources::total_articles_scraped + articles_new as i64),
                            ))
                            .execute(conn)
                            .await?;
                    } else {
                        diesel::update(sources::table.filter(sources::domain.eq(&source_domain)))
                            .set((
                                sources::last_scraped_at.eq(now),
                                sources::consecutive_failures.eq(sources::consecutive_failures + 1),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    Ok(())
                }
                .scope_boxed()
            })
            .await
            .map_err(CoreError::from)?;

        Ok(())
    }
}
