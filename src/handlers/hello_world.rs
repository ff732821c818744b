use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;

use crate::logger::Logger;

/// `GET /hello-world`
///
/// The request logger is only present when the logging middleware ran.
pub async fn hello_world(logger: Option<Extension<Logger>>) -> impl IntoResponse {
    if let Some(Extension(logger)) = &logger {
        logger.in_scope(|| tracing::debug!("serving hello world"));
    }

    (StatusCode::OK, Json(json!({ "message": "Hello, World!" })))
}
