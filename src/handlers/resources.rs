use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};

use crate::handlers::AppState;

/// Handle /api/resources/:path endpoint
pub async fn handle_resource(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let response = state.datasource.call_resource(&path, &body).await;
    (response.status, Json(response.body)).into_response()
}
