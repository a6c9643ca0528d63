//! `GET /api/v1/analytics/{trending,sentiment-trends,hot-entities,
//! entity-sentiment,overview,article-stats,database-health}` and
//! `POST /api/v1/analytics/refresh`, served from the
//! materialized-view-backed store reads via `Cache`.

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::app::App;
use crate::cache::keys;
use crate::error::{AppError, ErrorCode};
use crate::store::{EntityMention, SentimentBucket, TrendingTopic};

use super::envelope::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub hours: Option<i64>,
    pub min_articles: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn trending(State(app): State<App>, Query(q): Query<TrendingQuery>) -> Result<ApiResponse<Vec<TrendingTopic>>, AppError> {
    let hours = q.hours.unwrap_or(24);
    let min_articles = q.min_articles.unwrap_or(3);
    let limit = q.limit.unwrap_or(10);
    let cache_key = keys::analytics_trending(hours, min_articles, limit);
    let rows = app
        .cache
        .get_or_fetch(&cache_key, keys::TRENDING_TTL, || async { app.store.trending(hours, min_articles, limit).await })
        .await?;
    Ok(ApiResponse::ok(rows))
}

#[derive(Debug, Deserialize)]
pub struct SentimentQuery {
    pub source: Option<String>,
    pub hours: Option<i64>,
}

pub async fn sentiment_trends(
    State(app): State<App>,
    Query(q): Query<SentimentQuery>,
) -> Result<ApiResponse<Vec<SentimentBucket>>, AppError> {
    let hours = q.hours.unwrap_or(24);
    let cache_key = keys::analytics_sentiment(q.source.as_deref(), hours);
    let rows = app
        .cache
        .get_or_fetch(&cache_key, keys::SENTIMENT_TTL, || async {
            app.store.sentiment_trends(q.source.as_deref(), hours).await
        })
        .await?;
    Ok(ApiResponse::ok(rows))
}

#[derive(Debug, Deserialize)]
pub struct HotEntitiesQuery {
    pub entity_type: Option<String>,
    pub limit: Option<i64>,
}

pub async fn hot_entities(State(app): State<App>, Query(q): Query<HotEntitiesQuery>) -> Result<ApiResponse<Vec<EntityMention>>, AppError> {
    let rows = app.store.hot_entities(q.entity_type.as_deref(), q.limit.unwrap_or(20)).await?;
    Ok(ApiResponse::ok(rows))
}

#[derive(Debug, Deserialize)]
pub struct EntitySentimentQuery {
    pub entity: String,
}

pub async fn entity_sentiment(
    State(app): State<App>,
    Query(q): Query<EntitySentimentQuery>,
) -> Result<ApiResponse<EntityMention>, AppError> {
    app.store
        .entity_sentiment(&q.entity)
        .await?
        .map(ApiResponse::ok)
        .ok_or_else(|| AppError::new(ErrorCode::NotFound, format!("no mentions for entity {}", q.entity)))
}

pub async fn overview(State(app): State<App>) -> Result<ApiResponse<crate::store::AnalyticsSnapshot>, AppError> {
    Ok(ApiResponse::ok(app.store.analytics_overview().await?))
}

pub async fn article_stats(State(app): State<App>) -> Result<ApiResponse<crate::store::ArticleStats>, AppError> {
    Ok(ApiResponse::ok(app.store.article_stats().await?))
}

pub async fn database_health(State(app): State<App>) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let healthy = app.store.database_health().await?;
    Ok(ApiResponse::ok(json!({"healthy": healthy})))
}

/// Idempotent: re-running a refresh simply recomputes the same views.
pub async fn refresh(State(app): State<App>) -> Result<ApiResponse<Vec<crate::store::ViewRefreshResult>>, AppError> {
    let results = app.store.refresh_analytics(true).await?;
    app.cache.invalidate_tag(crate::cache::Tag::Analytics).await;
    Ok(ApiResponse::ok(results))
}
