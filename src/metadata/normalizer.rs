use url::Url;

use super::resolver::{default_favicon, make_url_absolute};
use crate::models::{ExtractedMetadata, PageMetadata};

/// Normalized metadata plus the preview image still waiting on a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    pub metadata: PageMetadata,
    pub preview_image: Option<String>,
}

/// Shape extractor output into `PageMetadata`, making every link absolute
/// against the requested URL.
///
/// `images` is left empty; the preview image only becomes an `ImageInfo`
/// once its dimensions are known.
pub fn normalize(requested: &Url, original_url: &str, extracted: ExtractedMetadata) -> NormalizedPage {
    let url = extracted
        .canonical_url
        .as_deref()
        .map(|c| make_url_absolute(requested, c))
        .unwrap_or_else(|| original_url.to_string());

    let favicon_url = extracted
        .icon_url
        .as_deref()
        .map(|icon| make_url_absolute(requested, icon))
        .unwrap_or_else(|| default_favicon(requested));

    let preview_image = extracted
        .image_url
        .as_deref()
        .map(|image| make_url_absolute(requested, image));

    NormalizedPage {
        metadata: PageMetadata {
            url,
            original_url: original_url.to_string(),
            provider_name: extracted.provider,
            title: extracted.title,
            description: extracted.description,
            favicon_url,
            images: Vec::new(),
        },
        preview_image,
    }
}
