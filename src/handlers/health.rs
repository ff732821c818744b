use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use super::AppState;

/// Liveness probe
/// Returns 200 OK while the process can serve HTTP at all
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "service": &*state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
