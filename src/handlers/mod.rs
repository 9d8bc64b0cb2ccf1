pub mod metadata;

use axum::{http::StatusCode, Json};

use crate::error::AppError;
use crate::models::VersionInfo;

pub const BAD_PATH: &str = "This is not a valid path for this service.  Please refer to the documentation: https://github.com/mozilla/page-metadata-service#url-metadata";

pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

pub async fn lb_heartbeat() -> StatusCode {
    StatusCode::OK
}

pub async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        source: env!("CARGO_PKG_REPOSITORY"),
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
    })
}

/// Fallback for `POST /` and any route this service does not serve.
pub async fn bad_path() -> AppError {
    AppError::NotFound(BAD_PATH.into())
}
