//! Read-heavy HTTP API: router assembly, the shared response
//! envelope, and per-resource handler modules.

pub mod admin;
pub mod analytics;
pub mod articles;
pub mod envelope;
pub mod health;
pub mod rate_limit;
pub mod sources;

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::app::App;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(app: App) -> Router {
    let api = Router::new()
        .route("/articles", get(articles::list))
        .route("/articles/search", get(articles::search))
        .route("/articles/stats", get(articles::stats))
        .route("/articles/{id}", get(articles::get))
        .route("/articles/{id}/enrichment", get(articles::enrichment))
        .route("/articles/{id}/extract-content", post(admin::extract_content))
        .route("/articles/{id}/process", post(admin::trigger_process))
        .route("/sources", get(sources::list))
        .route("/categories", get(sources::categories))
        .route("/scrape", post(admin::trigger_scrape))
        .route("/ai/process/trigger", post(admin::trigger_ai_batch))
        .route("/analytics/trending", get(analytics::trending))
        .route("/analytics/sentiment-trends", get(analytics::sentiment_trends))
        .route("/analytics/hot-entities", get(analytics::hot_entities))
        .route("/analytics/entity-sentiment", get(analytics::entity_sentiment))
        .route("/analytics/overview", get(analytics::overview))
        .route("/analytics/article-stats", get(analytics::article_stats))
        .route("/analytics/database-health", get(analytics::database_health))
        .route("/analytics/refresh", post(analytics::refresh));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/metrics", get(health::metrics))
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(app.clone(), rate_limit::enforce))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.parse().unwrap()))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER.parse().unwrap(), MakeRequestUuid))
        .layer(middleware::from_fn(inject_request_id))
        .with_state(app)
}

/// Stamps the envelope's `request_id` field with the `x-request-id` header
/// `SetRequestIdLayer`/`PropagateRequestIdLayer` already attached to the
/// response — including responses short-circuited by `rate_limit::enforce`
/// before reaching a handler, since this layer wraps the whole stack.
async fn inject_request_id(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let Some(request_id) = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    if let Some(object) = value.as_object_mut() {
        object.insert("request_id".to_string(), serde_json::Value::String(request_id));
    }

    let rewritten = serde_json::to_vec(&value).unwrap_or_else(|_| bytes.to_vec());
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(rewritten))
}
