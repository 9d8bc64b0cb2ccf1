use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::metadata::service::URLS_REQUIRED;
use crate::models::{BatchResponse, MetadataRequest};
use crate::state::AppState;

pub const HEADER_REQUIRED: &str = "The content-type header must be set to application/json.";

/// `true` for `application/json`, with or without parameters such as a charset.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

// ── Handler ────────────────────────────────────────────────────────────────

/// POST /v1/metadata
///
/// Body: `{"urls": ["http://...", ...]}`. Responds 200 once every URL has
/// settled, with per-URL failures reported in `url_errors`. The body is
/// validated by hand so that rejections keep the batch response shape.
pub async fn get_metadata(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<BatchResponse>> {
    if !is_json_content_type(&headers) {
        return Err(AppError::UnsupportedMediaType(HEADER_REQUIRED.into()));
    }

    let request: MetadataRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected malformed metadata request");
        AppError::Validation(URLS_REQUIRED.into())
    })?;

    tracing::info!(count = request.urls.len(), "Processing metadata batch");

    let response = state.service.run(request.urls).await?;
    Ok(Json(response))
}
