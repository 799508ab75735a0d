use axum::{body::Bytes, extract::State, Json};

use crate::{
    error::AppError,
    handlers::AppState,
    models::query::{QueryDataRequest, QueryDataResponse},
};

/// Handle /api/query endpoint
///
/// Any malformed sub-query rejects the whole batch with 400.
pub async fn handle_query(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QueryDataResponse>, AppError> {
    let batch: QueryDataRequest = serde_json::from_slice(&body)?;
    let response = state.datasource.query_data(batch).await?;
    Ok(Json(response))
}
