use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::{handlers::AppState, models::query::HealthStatus};

/// Process liveness
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Datasource health: 200 when the remote service answers, 503 otherwise
pub async fn datasource_health(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.datasource.check_health().await;
    let status = match result.status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(result))
}
