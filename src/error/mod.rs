use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::BatchResponse;

// ============================================================================
// Request-level errors
// ============================================================================

/// Errors that reject a whole batch before (or instead of) running pipelines.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(msg) => {
                return (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response();
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(BatchResponse::request_error(self.to_string()))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// ============================================================================
// Per-URL errors
// ============================================================================

/// Terminal failure of a single URL pipeline. Rendered into `url_errors`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    PolicyDenied(String),

    #[error("Robots.txt disallows this request")]
    RobotsDenied,

    #[error("Request Failure: {status} {reason}")]
    FetchStatus { status: u16, reason: String },

    #[error("Request Failure: {0}")]
    Network(String),

    #[error("{0}")]
    Parse(String),

    #[error("Metadata pipeline crashed: {0}")]
    Crashed(String),
}

impl From<ExtractError> for PipelineError {
    fn from(e: ExtractError) -> Self {
        PipelineError::Parse(e.0)
    }
}

/// Raised by a `MetadataExtractor` that cannot make sense of a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ExtractError(pub String);

/// A preview image whose dimensions could not be determined. Never terminal.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Image request failed: {0}")]
    Request(String),

    #[error("Image request refused: {0}")]
    Denied(String),

    #[error("Image request returned status {0}")]
    Status(u16),

    #[error("Unable to determine image dimensions: {0}")]
    Decode(String),

    #[error("Image header not found within {0} bytes")]
    TooLarge(usize),
}

// ============================================================================
// Startup errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
