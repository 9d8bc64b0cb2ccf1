use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Application routes without middleware. `main` layers CORS, tracing and
/// metrics on top; tests drive this router directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/metadata", post(handlers::metadata::get_metadata))
        .route("/", post(handlers::bad_path))
        // Health and version
        .route("/__heartbeat__", get(handlers::heartbeat))
        .route("/__lbheartbeat__", get(handlers::lb_heartbeat))
        .route("/__version__", get(handlers::version))
        .fallback(handlers::bad_path)
        .with_state(state)
}
