//! HTTP handlers for service health.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// GET /healthz
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /readyz — verifies the bus connection is usable.
pub async fn ready(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .bus
        .ping()
        .await
        .map_err(|err| ApiError::ServiceUnavailable(format!("bus unreachable: {err}")))?;
    Ok(Json(json!({ "status": "ready" })))
}
