//! `GET /api/v1/articles`, `/articles/{id}`, `/articles/{id}/enrichment`,
//! `/articles/search`, `/articles/stats`.

use axum::extract::{Path, Query, State};
use serde::Serialize;
use serde_json::json;

use crate::app::App;
use crate::cache::{keys, Tag};
use crate::error::{AppError, ErrorCode};
use crate::models::Article;

use super::envelope::{ApiResponse, ArticleListQuery, PageMeta};

pub async fn list(State(app): State<App>, Query(q): Query<ArticleListQuery>) -> Result<ApiResponse<Vec<Article>>, AppError> {
    let filter = q.filter();
    let sort = q.sort()?;
    let page = q.page();

    let cache_key = keys::articles_list(&q.cache_hash());
    let result = app
        .cache
        .get_or_fetch(&cache_key, keys::LIST_TTL, || async {
            app.store.list_articles(&filter, sort, page).await
        })
        .await?;
    app.cache.tag(Tag::ArticlesList, &cache_key);

    let meta = PageMeta::new(result.total, page.limit, page.offset, result.has_next, result.has_prev);
    Ok(ApiResponse::paged(result.rows, meta))
}

pub async fn search(State(app): State<App>, Query(q): Query<ArticleListQuery>) -> Result<ApiResponse<Vec<Article>>, AppError> {
    if q.search.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(AppError::new(ErrorCode::MissingQuery, "missing required `search` query parameter"));
    }
    list(State(app), Query(q)).await
}

pub async fn get(State(app): State<App>, Path(id): Path<i64>) -> Result<ApiResponse<Article>, AppError> {
    let cache_key = keys::articles_get(id);
    let article = app
        .cache
        .get_or_fetch(&cache_key, keys::GET_TTL, || async move {
            app.store
                .get_article(id)
                .await?
                .ok_or_else(|| crate::error::CoreError::Permanent(format!("article {id} not found")))
        })
        .await
        .map_err(|e| match e {
            crate::error::CoreError::Permanent(_) => AppError::new(ErrorCode::NotFound, format!("article {id} not found")),
            other => other.into(),
        })?;
    Ok(ApiResponse::ok(article))
}

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct Enrichment {
    pub sentiment: Option<f64>,
    pub sentiment_label: Option<String>,
    pub summary: Option<String>,
    pub categories: Option<serde_json::Value>,
    pub entities: Option<serde_json::Value>,
    pub keywords: Option<serde_json::Value>,
    pub stock_tickers: Option<serde_json::Value>,
    pub processed: bool,
}

pub async fn enrichment(State(app): State<App>, Path(id): Path<i64>) -> Result<ApiResponse<Enrichment>, AppError> {
    let cache_key = keys::articles_enrichment(id);
    let enrichment = app
        .cache
        .get_or_fetch(&cache_key, keys::ENRICHMENT_TTL, || async move {
            let article = app
                .store
                .get_article(id)
                .await?
                .ok_or_else(|| crate::error::CoreError::Permanent(format!("article {id} not found")))?;
            Ok(Enrichment {
                sentiment: article.ai_sentiment,
                sentiment_label: article.ai_sentiment_label,
                summary: article.ai_summary,
                categories: article.ai_categories,
                entities: article.ai_entities,
                keywords: article.ai_keywords,
                stock_tickers: article.ai_stock_tickers,
                processed: article.ai_processed,
            })
        })
        .await
        .map_err(|e| match e {
            crate::error::CoreError::Permanent(_) => AppError::new(ErrorCode::NotFound, format!("article {id} not found")),
            other => other.into(),
        })?;
    Ok(ApiResponse::ok(enrichment))
}

pub async fn stats(State(app): State<App>) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let cache_key = keys::articles_stats();
    let stats = app
        .cache
        .get_or_fetch(&cache_key, keys::STATS_TTL, || async { app.store.article_stats().await })
        .await?;
    app.cache.tag(Tag::ArticlesStats, &cache_key);
    Ok(ApiResponse::ok(json!(stats)))
}

/// `POST /api/v1/articles/{id}/extract-content` (admin): forces
/// `HtmlExtractor` then `BrowserExtractor` for one article, bypassing the
/// normal claim/backoff cadence.
pub async fn extract_content(State(app): State<App>, Path(id): Path<i64>) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let article = app
        .store
        .get_article(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::NotFound, format!("article {id} not found")))?;

    let html = crate::scrape::html_extract::HtmlExtractor::new(app.http.clone());
    let robots = crate::scrape::robots::RobotsGate::new(app.http.clone());

    if app.config.scraping.enable_robots_txt_check {
        let parsed = url::Url::parse(&article.url).map_err(|e| AppError::new(ErrorCode::InvalidRequest, e.to_string()))?;
        if robots.check(&parsed).await == crate::scrape::robots::RobotsDecision::Deny {
            return Err(AppError::new(ErrorCode::ExtractionFailed, "disallowed by robots.txt"));
        }
    }

    let text = match html.extract(&article.url, &article.source).await {
        Ok(extracted) => Some(extracted.text),
        Err(crate::error::CoreError::NoContent) => extract_via_browser(&app, &article.url, &article.source).await?,
        Err(e) => return Err(e.into()),
    };

    match text {
        Some(text) => {
            app.store.write_content(id, &text).await?;
            app.cache.invalidate_key(&keys::articles_get(id)).await;
            Ok(ApiResponse::ok(json!({"article_id": id, "content_length": text.len()})))
        }
        None => {
            app.store.write_content_failure(id, app.config.backfill.max_attempts).await?;
            Err(AppError::new(ErrorCode::ExtractionFailed, "no content extracted"))
        }
    }
}

#[cfg(feature = "browser-fallback")]
async fn extract_via_browser(app: &App, url: &str, source: &str) -> Result<Option<String>, AppError> {
    match &app.browser {
        Some(browser) => match browser.extract(url, source, std::time::Duration::from_secs(30)).await {
            Ok(extracted) => Ok(Some(extracted.text)),
            Err(crate::error::CoreError::NoContent) => Ok(None),
            Err(e) => Err(e.into()),
        },
        None => Ok(None),
    }
}

#[cfg(not(feature = "browser-fallback"))]
async fn extract_via_browser(_app: &App, _url: &str, _source: &str) -> Result<Option<String>, AppError> {
    Ok(None)
}
