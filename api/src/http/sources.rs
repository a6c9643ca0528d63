//! `GET /api/v1/sources`, `GET /api/v1/categories`.

use axum::extract::State;

use crate::app::App;
use crate::error::AppError;
use crate::models::Source;

use super::envelope::ApiResponse;

pub async fn list(State(app): State<App>) -> Result<ApiResponse<Vec<Source>>, AppError> {
    Ok(ApiResponse::ok(app.store.list_sources().await?))
}

pub async fn categories(State(app): State<App>) -> Result<ApiResponse<Vec<String>>, AppError> {
    Ok(ApiResponse::ok(app.store.distinct_categories().await?))
}
