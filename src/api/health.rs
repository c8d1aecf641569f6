use axum::http::StatusCode;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;

use crate::app_state::AppState;
use crate::core::store::RequestFilter;

/// Defines health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

/// Verifies that the API is running; checks nothing else.
async fn liveness_check() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": "API is live" }))
}

/// Verifies the engine answers: an inventory snapshot plus a request
/// listing. Returns `503` if either side is wedged on a lock.
async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let resources = state.inventory.snapshot().len();
    let requests = state
        .requests
        .list(&RequestFilter::default())
        .map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "success": false, "error": "Request store unavailable", "details": e.to_string() })
                    .to_string(),
            )
        })?
        .len();

    Ok(Json(json!({
        "success": true,
        "message": "API is ready",
        "resources": resources,
        "requests": requests,
    })))
}
