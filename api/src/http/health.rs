//! `/health`, `/health/live`, `/health/ready`, `/health/metrics`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::app::App;
use crate::health::ComponentStatus;

pub async fn health(State(app): State<App>) -> impl IntoResponse {
    let store_status = match app.store.database_health().await {
        Ok(true) => ComponentStatus::Healthy,
        _ => ComponentStatus::Unhealthy,
    };
    app.health.set("store", store_status);
    let report = app.health.report();
    let status = if report.status == crate::health::OverallStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "live"})))
}

pub async fn ready(State(app): State<App>) -> impl IntoResponse {
    let store_status = match app.store.database_health().await {
        Ok(true) => ComponentStatus::Healthy,
        _ => ComponentStatus::Unhealthy,
    };
    app.health.set("store", store_status);

    if app.health.is_ready() {
        (StatusCode::OK, Json(json!({"status": "ready"})))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not ready"})))
    }
}

pub async fn metrics(State(app): State<App>) -> impl IntoResponse {
    let report = app.health.report();
    Json(json!({
        "status": report.status,
        "uptime_sec": report.uptime_sec,
        "components": report.components,
    }))
}
