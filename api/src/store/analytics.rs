use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable, Text, Timestamptz};
use diesel_async::RunQueryDsl;
use serde::Serialize;

use crate::error::CoreError;

use super::Store;

/// The three read-only materialized structures the core relies on: trending keywords by hour bucket, sentiment timeline by
/// hour-source-category, entity mentions by day-entity-type.
const MATERIALIZED_VIEWS: &[&str] =
    &["mv_trending_keywords", "mv_sentiment_timeline", "mv_entity_mentions"];

#[derive(Debug, Clone, Serialize)]
pub struct ViewRefreshResult {
    pub view: String,
    pub duration_ms: i64,
    pub row_count: i64,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize, QueryableByName)]
pub struct TrendingTopic {
    #[diesel(sql_type = Text)]
    pub keyword: String,
    #[diesel(sql_type = BigInt)]
    pub article_count: i64,
    #[diesel(sql_type = BigInt)]
    pub source_count: i64,
    #[diesel(sql_type = Double)]
    pub avg_sentiment: f64,
    #[diesel(sql_type = Timestamptz)]
    pub latest_article: chrono::DateTime<chrono::Utc>,
    #[diesel(sql_type = Double)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize, QueryableByName)]
pub struct SentimentBucket {
    #[diesel(sql_type = Timestamptz)]
    pub hour: chrono::DateTime<chrono::Utc>,
    #[diesel(sql_type = Nullable<Text>)]
    pub source: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub category: Option<String>,
    #[diesel(sql_type = Double)]
    pub avg_sentiment: f64,
    #[diesel(sql_type = BigInt)]
    pub article_count: i64,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize, QueryableByName)]
pub struct EntityMention {
    #[diesel(sql_type = Text)]
    pub entity: String,
    #[diesel(sql_type = Text)]
    pub entity_type: String,
    #[diesel(sql_type = BigInt)]
    pub mentions: i64,
    #[diesel(sql_type = Double)]
    pub avg_sentiment: f64,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize, QueryableByName)]
pub struct AnalyticsSnapshot {
    #[diesel(sql_type = BigInt)]
    pub total_articles: i64,
    #[diesel(sql_type = BigInt)]
    pub total_sources: i64,
    #[diesel(sql_type = BigInt)]
    pub ai_processed: i64,
    #[diesel(sql_type = BigInt)]
    pub last_24h: i64,
}

impl Store {
    /// Refreshes the three materialized views, returning per-view timing and
    /// row counts. `concurrent` uses `REFRESH MATERIALIZED VIEW CONCURRENTLY`
    /// (requires a unique index on each view) so reads are never blocked.
    pub async fn refresh_analytics(&self, concurrent: bool) -> Result<Vec<ViewRefreshResult>, CoreError> {
        let mut conn = self.pool().get().await?;
        let mut results = Vec::with_capacity(MATERIALIZED_VIEWS.len());
        for view in MATERIALIZED_VIEWS {
            let started = std::time::Instant::now();
            let sql = if concurrent {
                format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {view}")
            } else {
                format!("REFRESH MATERIALIZED VIEW {view}")
            };
            diesel::sql_query(sql).execute(&mut conn).await?;
            let row_count: i64 = diesel::sql_query(format!("SELECT count(*) AS count FROM {view}"))
                .get_result::<RowCount>(&mut conn)
                .await?
                .count;
            results.push(ViewRefreshResult {
                view: view.to_string(),
                duration_ms: started.elapsed().as_millis() as i64,
                row_count,
            });
        }
        Ok(results)
    }

    /// `hours=0` yields an empty sequence and no error.
    pub async fn trending(&self, hours: i64, min_articles: i64, limit: i64) -> Result<Vec<TrendingTopic>, CoreError> {
        if hours <= 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.pool().get().await?;
        let rows: Vec<TrendingTopic> = diesel::sql_query(
            "SELECT keyword, article_count, source_count, avg_sentiment, latest_article, \
             (article_count::double precision * (1.0 + source_count::double precision / 10.0) \
              * (1.0 / (1.0 + extract(epoch from (now() - latest_article)) / 3600.0))) AS score \
             FROM mv_trending_keywords \
             WHERE latest_article >= now() - ($1 || ' hours')::interval \
               AND article_count >= $2 \
             ORDER BY score DESC \
             LIMIT $3",
        )
        .bind::<Text, _>(hours.to_string())
        .bind::<BigInt, _>(min_articles)
        .bind::<BigInt, _>(limit.clamp(1, 100))
        .load(&mut conn)
        .await?;
        Ok(rows)
    }

    pub async fn sentiment_trends(&self, source: Option<&str>, hours: i64) -> Result<Vec<SentimentBucket>, CoreError> {
        let mut conn = self.pool().get().await?;
        let rows: Vec<SentimentBucket> = diesel::sql_query(
            "SELECT hour, source, category, avg_sentiment, article_count FROM mv_sentiment_timeline \
             WHERE hour >= now() - ($1 || ' hours')::interval \
               AND ($2::text IS NULL OR source = $2) \
             ORDER BY hour DESC",
        )
        .bind::<Text, _>(hours.to_string())
        .bind::<Nullable<Text>, _>(source.map(|s| s.to_string()))
        .load(&mut conn)
        .await?;
        Ok(rows)
    }

    pub async fn hot_entities(&self, entity_type: Option<&str>, limit: i64) -> Result<Vec<EntityMention>, CoreError> {
        let mut conn = self.pool().get().await?;
        let rows: Vec<EntityMention> = diesel::sql_query(
            "SELECT entity, entity_type, mentions, avg_sentiment FROM mv_entity_mentions \
             WHERE ($1::text IS NULL OR entity_type = $1) \
             ORDER BY mentions DESC \
             LIMIT $2",
        )
        .bind::<Nullable<Text>, _>(entity_type.map(|s| s.to_string()))
        .bind::<BigInt, _>(limit.clamp(1, 100))
        .load(&mut conn)
        .await?;
        Ok(rows)
    }

    pub async fn entity_sentiment(&self, entity: &str) -> Result<Option<EntityMention>, CoreError> {
        let mut conn = self.pool().get().await?;
        let row: Option<EntityMention> = diesel::sql_query(
            "SELECT entity, entity_type, mentions, avg_sentiment FROM mv_entity_mentions WHERE entity = $1 \
             ORDER BY mentions DESC LIMIT 1",
        )
        .bind::<Text, _>(entity.to_string())
        .get_result(&mut conn)
        .await
        .optional()?;
        Ok(row)
    }

    pub async fn analytics_overview(&self) -> Result<AnalyticsSnapshot, CoreError> {
        let mut conn = self.pool().get().await?;
        let row: AnalyticsSnapshot = diesel::sql_query(
            "SELECT \
               (SELECT count(*) FROM articles) AS total_articles, \
               (SELECT count(*) FROM sources WHERE is_active) AS total_sources, \
               (SELECT count(*) FROM articles WHERE ai_processed) AS ai_processed, \
               (SELECT count(*) FROM articles WHERE created_at >= now() - interval '24 hours') AS last_24h",
        )
        .get_result(&mut conn)
        .await?;
        Ok(row)
    }

    /// Backs `/health` and `database-health`: checks connectivity and the
    /// size of the current connection pool.
    pub async fn database_health(&self) -> Result<bool, CoreError> {
        self.ping().await.map(|_| true)
    }
}

#[derive(QueryableByName)]
struct RowCount {
    #[diesel(sql_type = BigInt)]
    count: i64,
}
