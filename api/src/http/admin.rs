//! Admin-authenticated endpoints: `POST /articles/{id}/process`,
//! `POST /scrape`, `POST /ai/process/trigger`. Requires the
//! `X-Admin-Key` header to match `ApiConfig.admin_key`; absence or mismatch
//! yields `401 UNAUTHORIZED`.

use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use serde::Deserialize;
use serde_json::json;

use crate::app::App;
use crate::error::{AppError, ErrorCode};

use super::envelope::ApiResponse;

pub struct AdminAuth;

#[axum::async_trait]
impl FromRequestParts<App> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, app: &App) -> Result<Self, Self::Rejection> {
        let expected = app
            .config
            .api
            .admin_key
            .as_deref()
            .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "admin endpoints are disabled"))?;

        let provided = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing X-Admin-Key header"))?;

        if provided != expected {
            return Err(AppError::new(ErrorCode::Unauthorized, "invalid admin key"));
        }
        Ok(AdminAuth)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ScrapeRequest {
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_request_defaults_to_no_source_filter() {
        let req: ScrapeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.source, None);
    }

    #[test]
    fn scrape_request_parses_an_explicit_source() {
        let req: ScrapeRequest = serde_json::from_str(r#"{"source":"nos.nl"}"#).unwrap();
        assert_eq!(req.source.as_deref(), Some("nos.nl"));
    }
}

pub async fn trigger_scrape(
    _auth: AdminAuth,
    State(app): State<App>,
    body: Bytes,
) -> Result<ApiResponse<crate::scrape::RunSummary>, AppError> {
    let source = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<ScrapeRequest>(&body)
            .map_err(|e| AppError::new(ErrorCode::InvalidRequest, format!("invalid request body: {e}")))?
            .source
    };
    let summary = app.scrape.run(source.as_deref()).await?;
    app.cache.invalidate_tag(crate::cache::Tag::ArticlesList).await;
    app.cache.invalidate_tag(crate::cache::Tag::ArticlesStats).await;
    Ok(ApiResponse::ok(summary))
}

pub async fn trigger_process(_auth: AdminAuth, State(app): State<App>, Path(id): Path<i64>) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let ai = app.ai.as_ref().ok_or_else(|| AppError::new(ErrorCode::ProcessingError, "AI processing is disabled"))?;
    ai.process_one_article(id).await?;
    Ok(ApiResponse::ok(json!({"article_id": id, "processed": true})))
}

pub async fn trigger_ai_batch(_auth: AdminAuth, State(app): State<App>) -> Result<ApiResponse<crate::ai::CycleProgress>, AppError> {
    let ai = app.ai.as_ref().ok_or_else(|| AppError::new(ErrorCode::ProcessingError, "AI processing is disabled"))?;
    let queue_depth = app.store.count_pending_ai().await?;
    let progress = ai.run_cycle(queue_depth).await?;
    Ok(ApiResponse::ok(progress))
}

pub async fn extract_content(
    _auth: AdminAuth,
    state: State<App>,
    path: Path<i64>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    super::articles::extract_content(state, path).await
}
