use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ============================================================================
// Request
// ============================================================================

/// Body of `POST /v1/metadata`.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataRequest {
    pub urls: Vec<String>,
}

// ============================================================================
// Per-URL metadata
// ============================================================================

/// Normalized metadata for one page.
///
/// Every URL-valued field is absolute. Optional fields serialize as `null`
/// when the page does not declare them; they are never defaulted to `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub url: String,
    pub original_url: String,
    pub provider_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub favicon_url: String,
    pub images: Vec<ImageInfo>,
}

/// A preview image whose dimensions were successfully probed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Raw fields pulled out of a document by a `MetadataExtractor`.
///
/// URLs are exactly as they appear in the markup and may be relative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub icon_url: Option<String>,
    pub image_url: Option<String>,
    pub canonical_url: Option<String>,
}

/// The settled outcome of one URL pipeline, keyed by the URL as requested.
#[derive(Debug)]
pub struct UrlResult {
    pub url: String,
    pub outcome: Result<PageMetadata, PipelineError>,
}

// ============================================================================
// Batch response
// ============================================================================

/// Response body for every `POST /v1/metadata` call, including failures.
///
/// A URL appears in at most one of `url_errors` and `urls`. Both maps are
/// ordered so identical batches serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub request_error: String,
    pub url_errors: BTreeMap<String, String>,
    pub urls: BTreeMap<String, PageMetadata>,
}

impl BatchResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty response carrying only a request-level error.
    pub fn request_error(message: impl Into<String>) -> Self {
        BatchResponse {
            request_error: message.into(),
            ..Self::default()
        }
    }

    /// Record a settled pipeline. Successes and failures land in disjoint maps.
    pub fn insert(&mut self, result: UrlResult) {
        match result.outcome {
            Ok(metadata) => {
                self.url_errors.remove(&result.url);
                self.urls.insert(result.url, metadata);
            }
            Err(e) => {
                self.urls.remove(&result.url);
                self.url_errors.insert(result.url, e.to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len() + self.url_errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of `GET /__version__`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub source: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
}
