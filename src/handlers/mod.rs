pub mod health;
pub mod hello_world;

use axum::http::Uri;
use std::sync::Arc;

use crate::error::AppError;

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
}

impl AppState {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: Arc::from(service_name),
        }
    }
}

/// Fallback for unmatched routes
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
