use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Startup errors. Every variant is fatal: the process does not start.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to read configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("document store connection failed: {context}")]
    DatastoreConnection {
        context: String,
        #[source]
        source: mongodb::error::Error,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    pub fn datastore(context: impl Into<String>, source: mongodb::error::Error) -> Self {
        Error::DatastoreConnection {
            context: context.into(),
            source,
        }
    }
}

/// Request-level errors returned by handlers
#[derive(Debug)]
pub enum AppError {
    /// No route or resource
    NotFound(String),
    /// Malformed request
    BadRequest(String),
    /// Internal server error, including recovered panics
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type_name(&self),
            }
        }));

        let mut response = (status, body).into_response();
        // The logging middleware appends these to the completion record
        response
            .extensions_mut()
            .insert(RequestErrors::from(vec![self.to_string()]));
        response
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound(_) => "not_found",
        AppError::BadRequest(_) => "bad_request",
        AppError::Internal(_) => "internal_error",
    }
}

/// Errors accumulated while handling a single request.
///
/// Handlers and recovery layers attach this to the response extensions; it
/// never changes the response itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestErrors(Vec<String>);

impl RequestErrors {
    pub fn push(&mut self, error: impl Into<String>) {
        self.0.push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<String>> for RequestErrors {
    fn from(errors: Vec<String>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for RequestErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "Error #{:02}: {}", idx + 1, error)?;
        }
        Ok(())
    }
}
