use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::RunQueryDsl;

use crate::error::CoreError;
use crate::models::article::{Article, NewArticle};
use crate::schema::articles;

use super::Store;

const STALE_LOCK_MINUTES: i64 = 15;

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub source: Option<String>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Published,
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct ArticleSort {
    pub field: SortField,
    pub dir: SortDir,
}

impl Default for ArticleSort {
    fn default() -> Self {
        Self { field: SortField::Published, dir: SortDir::Desc }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Clamps `limit` to [1, 100] and `offset` to >= 0.
    pub fn clamp(limit: i64, offset: i64) -> Self {
        Self { limit: limit.clamp(1, 100), offset: offset.max(0) }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PagedResult<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    pub inserted_ids: Vec<i64>,
    pub updated_ids: Vec<i64>,
    pub skipped_urls: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArticleStats {
    pub total: i64,
    pub per_source: std::collections::HashMap<String, i64>,
    pub last_24h: i64,
}

#[derive(Debug, Clone, QueryableByName)]
pub struct ArticleRef {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub url: String,
    #[diesel(sql_type = Text)]
    pub source: String,
}

fn apply_filter<'a>(
    mut query: articles::BoxedQuery<'a, diesel::pg::Pg>,
    filter: &'a ArticleFilter,
) -> articles::BoxedQuery<'a, diesel::pg::Pg> {
    if let Some(source) = &filter.source {
        query = query.filter(articles::source.eq(source));
    }
    if let Some(category) = &filter.category {
        query = query.filter(articles::category.eq(category));
    }
    if let Some(keyword) = &filter.keyword {
        query = query.filter(articles::keywords.contains(vec![keyword.clone()]));
    }
    if let Some(search) = &filter.search {
        // Full-text search over the precomputed title+summary(+content) index
        //; `plainto_tsquery` tolerates free-form user input.
        query = query.filter(
            diesel::dsl::sql::<diesel::sql_types::Bool>(
                "to_tsvector('simple', title || ' ' || summary || ' ' || coalesce(content, '')) @@ plainto_tsquery('simple', ",
            )
            .bind::<Text, _>(search.clone())
            .sql(")"),
        );
    }
    if let Some(start) = filter.start_date {
        query = query.filter(articles::published.ge(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(articles::published.le(end));
    }
    query
}

impl Store {
    /// Single round trip; conflicts on `url` or `content_hash` fall back to
    /// update-if-newer. All-or-nothing: invalid drafts are excluded up front
    /// rather than aborting the whole batch.
    pub async fn upsert_articles(&self, batch: Vec<NewArticle>) -> Result<UpsertOutcome, CoreError> {
        let mut outcome = UpsertOutcome::default();
        if batch.is_empty() {
            return Ok(outcome);
        }

        // Dedup same-url drafts within the batch, keeping the later `published`
        //.
        let mut by_url: std::collections::HashMap<String, NewArticle> = std::collections::HashMap::new();
        for draft in batch {
            if draft.url.trim().is_empty() || draft.title.trim().is_empty() {
                outcome.skipped_urls.push(draft.url);
                continue;
            }
            match by_url.get(&draft.url) {
                Some(existing) if existing.published >= draft.published => {}
                _ => {
                    by_url.insert(draft.url.clone(), draft);
                }
            }
        }
        let drafts: Vec<NewArticle> = by_url.into_values().collect();
        if drafts.is_empty() {
            return Ok(outcome);
        }

        let mut conn = self.pool().get().await?;
        let urls: Vec<String> = drafts.iter().map(|d| d.url.clone()).collect();

        let result: Result<(Vec<i64>, Vec<i64>), diesel::result::Error> = conn
            .transaction(|conn| {
                async move {
                    let existing: Vec<(i64, String, DateTime<Utc>, Option<String>)> = articles::table
                        .filter(articles::url.eq_any(&urls))
                        .select((articles::id, articles::url, articles::published, articles::content))
                        .load(conn)
                        .await?;
                    let existing_by_url: std::collections::HashMap<String, (i64, DateTime<Utc>, Option<String>)> =
                        existing.into_iter().map(|(id, url, published, content)| (url, (id, published, content))).collect();

                    let mut inserted = Vec::new();
                    let mut updated = Vec::new();

                    for draft in drafts {
                        match existing_by_url.get(&draft.url) {
                            Some((id, existing_published, existing_content)) => {
                                if draft.published > *existing_published {
                                    let content = draft.content.clone().or_else(|| existing_content.clone());
                                    diesel::update(articles::table.find(id))
                                        .set((
                                            articles::title.eq(&draft.title),
                                            articles::summary.eq(&draft.summary),
                                            articles::content.eq(content),
                                            articles::published.eq(draft.published),
                                            articles::author.eq(&draft.author),
                                            articles::category.eq(&draft.category),
                                            articles::keywords.eq(&draft.keywords),
                                            articles::image_url.eq(&draft.image_url),
                                        ))
                                        .execute(conn)
                                        .await?;
                                }
                                updated.push(*id);
                            }
                            None => {
                                let maybe_row: Option<Article> = diesel::insert_into(articles::table)
                                    .values(&draft)
                                    .on_conflict(articles::url)
                                    .do_nothing()
                                    .get_result(conn)
                                    .await
                                    .optional()?;
                                let row = match maybe_row {
                                    Some(row) => row,
                                    // lost an insert race to a concurrent writer; fetch the winner
                                    None => articles::table.filter(articles::url.eq(&draft.url)).first(conn).await?,
                                };
                                inserted.push(row.id);
                            }
                        }
                    }
                    Ok((inserted, updated))
                }
                .scope_boxed()
            })
            .await;

        let (inserted, updated) = result?;
        outcome.inserted_ids = inserted;
        outcome.updated_ids = updated;
        Ok(outcome)
    }

    pub async fn existing_urls(&self, urls: &[String]) -> Result<std::collections::HashSet<String>, CoreError> {
        if urls.is_empty() {
            return Ok(Default::default());
        }
        let mut conn = self.pool().get().await?;
        let found: Vec<String> = articles::table
            .filter(articles::url.eq_any(urls))
            .select(articles::url)
            .load(&mut conn)
            .await?;
        Ok(found.into_iter().collect())
    }

    pub async fn list_articles(
        &self,
        filter: &ArticleFilter,
        sort: ArticleSort,
        page: Page,
    ) -> Result<PagedResult<Article>, CoreError> {
        let mut conn = self.pool().get().await?;

        let count_query = apply_filter(articles::table.into_boxed(), filter);
        let total: i64 = count_query.count().get_result(&mut conn).await?;

        let mut query = apply_filter(articles::table.into_boxed(), filter);
        query = if let Some(search) = &filter.search {
            // Free-text search ranks by relevance, ties broken by recency,
            // overriding whatever sort the caller asked for.
            query.order(
                diesel::dsl::sql::<diesel::sql_types::Bool>(
                    "ts_rank(to_tsvector('simple', title || ' ' || summary || ' ' || coalesce(content, '')), \
                     plainto_tsquery('simple', ",
                )
                .bind::<Text, _>(search.clone())
                .sql(")) DESC, published DESC"),
            )
        } else {
            match (sort.field, sort.dir) {
                (SortField::Published, SortDir::Asc) => query.order(articles::published.asc()),
                (SortField::Published, SortDir::Desc) => query.order(articles::published.desc()),
                (SortField::CreatedAt, SortDir::Asc) => query.order(articles::created_at.asc()),
                (SortField::CreatedAt, SortDir::Desc) => query.order(articles::created_at.desc()),
                (SortField::Title, SortDir::Asc) => query.order(articles::title.asc()),
                (SortField::Title, SortDir::Desc) => query.order(articles::title.desc()),
            }
        };
        let rows: Vec<Article> = query.limit(page.limit).offset(page.offset).load(&mut conn).await?;

        Ok(PagedResult {
            has_next: page.offset + (rows.len() as i64) < total,
            has_prev: page.offset > 0,
            rows,
            total,
        })
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>, CoreError> {
        let mut conn = self.pool().get().await?;
        Ok(articles::table.find(id).first(&mut conn).await.optional()?)
    }

    /// Atomically claims the oldest unprocessed rows for AI enrichment,
    /// marking them with a soft lock. Stale locks are reclaimable so a
    /// crashed worker cannot block the queue forever.
    pub async fn claim_pending_for_ai(&self, limit: i64) -> Result<Vec<ArticleRef>, CoreError> {
        let mut conn = self.pool().get().await?;
        let rows: Vec<ArticleRef> = diesel::sql_query(
            "UPDATE articles SET ai_lock_at = now() \
             WHERE id IN ( \
                 SELECT id FROM articles \
                 WHERE ai_processed = false \
                   AND (ai_lock_at IS NULL OR ai_lock_at < now() - ($1 || ' minutes')::interval) \
                 ORDER BY created_at ASC \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING id, url, source",
        )
        .bind::<Text, _>(STALE_LOCK_MINUTES.to_string())
        .bind::<BigInt, _>(limit)
        .load(&mut conn)
        .await?;
        Ok(rows)
    }

    pub async fn claim_pending_for_content(&self, limit: i64) -> Result<Vec<ArticleRef>, CoreError> {
        let mut conn = self.pool().get().await?;
        let rows: Vec<ArticleRef> = diesel::sql_query(
            "UPDATE articles SET content_lock_at = now() \
             WHERE id IN ( \
                 SELECT id FROM articles \
                 WHERE content_extracted = false \
                   AND (content_lock_at IS NULL OR content_lock_at < now() - ($1 || ' minutes')::interval) \
                 ORDER BY created_at ASC \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING id, url, source",
        )
        .bind::<Text, _>(STALE_LOCK_MINUTES.to_string())
        .bind::<BigInt, _>(limit)
        .load(&mut conn)
        .await?;
        Ok(rows)
    }

    pub async fn write_enrichment(
        &self,
        article_id: i64,
        enrichment: &crate::ai::types::Enrichment,
    ) -> Result<(), CoreError> {
        let mut conn = self.pool().get().await?;
        let entities = serde_json::to_value(&enrichment.entities).unwrap_or(serde_json::Value::Null);
        let keywords = serde_json::to_value(&enrichment.keywords).unwrap_or(serde_json::Value::Null);
        let categories = serde_json::to_value(&enrichment.categories).unwrap_or(serde_json::Value::Null);
        let stock_tickers = serde_json::to_value(&enrichment.stock_tickers).unwrap_or(serde_json::Value::Null);

        diesel::update(articles::table.find(article_id))
            .set((
                articles::ai_processed.eq(true),
                articles::ai_processed_at.eq(Utc::now()),
                articles::ai_lock_at.eq(None::<DateTime<Utc>>),
                articles::ai_sentiment.eq(enrichment.sentiment.score),
                articles::ai_sentiment_label.eq(enrichment.sentiment.label.as_str()),
                articles::ai_summary.eq(&enrichment.summary),
                articles::ai_categories.eq(categories),
                articles::ai_entities.eq(entities),
                articles::ai_keywords.eq(keywords),
                articles::ai_stock_tickers.eq(stock_tickers),
                articles::ai_error.eq(None::<String>),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Clears the AI soft lock after a failed attempt. Past `max_attempts`
    /// the article is poison-pilled: marked processed with the error
    /// recorded, so the queue is never blocked on one bad article.
    pub async fn clear_ai_lock(&self, article_id: i64, error_text: &str, max_attempts: u32) -> Result<(), CoreError> {
        let mut conn = self.pool().get().await?;
        let attempts: i32 = diesel::update(articles::table.find(article_id))
            .set((
                articles::ai_lock_at.eq(None::<DateTime<Utc>>),
                articles::ai_attempts.eq(articles::ai_attempts + 1),
                articles::ai_error.eq(error_text),
            ))
            .returning(articles::ai_attempts)
            .get_result(&mut conn)
            .await?;

        if attempts >= max_attempts as i32 {
            diesel::update(articles::table.find(article_id))
                .set((articles::ai_processed.eq(true), articles::ai_processed_at.eq(Utc::now())))
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    pub async fn write_content(&self, article_id: i64, text: &str) -> Result<(), CoreError> {
        let mut conn = self.pool().get().await?;
        let hash = crate::utils::content_hash_for(article_id, text);
        diesel::update(articles::table.find(article_id))
            .set((
                articles::content.eq(text),
                articles::content_extracted.eq(true),
                articles::content_extracted_at.eq(Utc::now()),
                articles::content_lock_at.eq(None::<DateTime<Utc>>),
                articles::content_hash.eq(Some(hash)),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Mirrors `write_content` on repeated failure: past `max_attempts` the
    /// article is advanced to extracted-but-empty rather than left pending
    /// forever.
    pub async fn write_content_failure(&self, article_id: i64, max_attempts: u32) -> Result<(), CoreError> {
        let mut conn = self.pool().get().await?;
        let attempts: i32 = diesel::update(articles::table.find(article_id))
            .set((
                articles::content_lock_at.eq(None::<DateTime<Utc>>),
                articles::content_attempts.eq(articles::content_attempts + 1),
            ))
            .returning(articles::content_attempts)
            .get_result(&mut conn)
            .await?;

        if attempts >= max_attempts as i32 {
            diesel::update(articles::table.find(article_id))
                .set((articles::content_extracted.eq(true), articles::content_extracted_at.eq(Utc::now())))
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    /// Backs the AIProcessor's adaptive cadence: queue depth `Q`.
    pub async fn count_pending_ai(&self) -> Result<i64, CoreError> {
        let mut conn = self.pool().get().await?;
        Ok(articles::table.filter(articles::ai_processed.eq(false)).count().get_result(&mut conn).await?)
    }

    /// Backs `GET /articles/stats`: totals per source, plus a rolling
    /// last-24h count.
    pub async fn article_stats(&self) -> Result<ArticleStats, CoreError> {
        let mut conn = self.pool().get().await?;
        let total: i64 = articles::table.count().get_result(&mut conn).await?;
        let per_source: Vec<(String, i64)> = articles::table
            .group_by(articles::source)
            .select((articles::source, diesel::dsl::count_star()))
            .load(&mut conn)
            .await?;
        let last_24h: i64 = articles::table
            .filter(articles::created_at.ge(Utc::now() - chrono::Duration::hours(24)))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(ArticleStats { total, per_source: per_source.into_iter().collect(), last_24h })
    }

    pub async fn distinct_categories(&self) -> Result<Vec<String>, CoreError> {
        let mut conn = self.pool().get().await?;
        Ok(articles::table
            .filter(articles::category.is_not_null())
            .select(articles::category)
            .distinct()
            .load::<Option<String>>(&mut conn)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Best-effort write from StockEnricher; never fails the owning article
    /// if a quote provider lookup comes back empty.
    pub async fn write_stock_data(&self, article_id: i64, stock_data: serde_json::Value) -> Result<(), CoreError> {
        let mut conn = self.pool().get().await?;
        diesel::update(articles::table.find(article_id))
            .set((articles::stock_data.eq(stock_data), articles::stock_data_updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_to_valid_range() {
        let p = Page::clamp(500, -5);
        assert_eq!(p.limit, 100);
        assert_eq!(p.offset, 0);
        let p2 = Page::clamp(0, 10);
        assert_eq!(p2.limit, 1);
    }
}
