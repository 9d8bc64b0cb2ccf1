use std::sync::Arc;

use crate::metadata::MetadataService;

/// Shared application state passed to all handlers.
/// The service is built once at startup and holds no per-request state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetadataService>,
}

impl AppState {
    pub fn new(service: MetadataService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }
}
