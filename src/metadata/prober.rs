use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::ImageReader;
use reqwest::Client as ReqwestClient;
use url::Url;

use super::fetcher::get_following_redirects;
use super::policy::AddressGuard;
use crate::error::{PipelineError, ProbeError};
use crate::metrics::{MetricName, Metrics};

/// Stop downloading once this many bytes arrived without a readable header.
pub const MAX_PROBE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Looks up the pixel size of a remote image.
#[async_trait]
pub trait ImageProber: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ImageDimensions, ProbeError>;
}

/// Read the dimensions from an image header without decoding pixels.
pub fn dimensions_from_bytes(bytes: &[u8]) -> Result<ImageDimensions, ProbeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ProbeError::Decode(e.to_string()))?;

    if reader.format().is_none() {
        return Err(ProbeError::Decode("unrecognised image format".into()));
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ProbeError::Decode(e.to_string()))?;

    Ok(ImageDimensions { width, height })
}

/// Streams the image over HTTP and stops as soon as the header is readable.
///
/// Image URLs come from untrusted markup, so every hop passes the same
/// address guard as page fetches.
pub struct HttpImageProber {
    client: ReqwestClient,
    timeout: Duration,
    guard: AddressGuard,
    metrics: Arc<dyn Metrics>,
}

impl HttpImageProber {
    pub fn new(
        client: ReqwestClient,
        timeout: Duration,
        guard: AddressGuard,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        HttpImageProber {
            client,
            timeout,
            guard,
            metrics,
        }
    }

    async fn download_header(&self, url: &str) -> Result<ImageDimensions, ProbeError> {
        let target = Url::parse(url).map_err(|e| ProbeError::Request(e.to_string()))?;
        let guard = self.guard;
        let mut response =
            get_following_redirects(&self.client, &target, Some(self.timeout), move |hop| {
                async move { guard.check(&hop).await }
            })
            .await
            .map_err(|e| match e {
                PipelineError::PolicyDenied(reason) => ProbeError::Denied(reason),
                other => ProbeError::Request(other.to_string()),
            })?;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?
        {
            buf.extend_from_slice(&chunk);
            if let Ok(dims) = dimensions_from_bytes(&buf) {
                return Ok(dims);
            }
            if buf.len() >= MAX_PROBE_BYTES {
                return Err(ProbeError::TooLarge(MAX_PROBE_BYTES));
            }
        }

        dimensions_from_bytes(&buf)
    }
}

#[async_trait]
impl ImageProber for HttpImageProber {
    async fn probe(&self, url: &str) -> Result<ImageDimensions, ProbeError> {
        let started = Instant::now();
        let result = self.download_header(url).await;

        self.metrics.timing(MetricName::ImageTime, started.elapsed());
        match &result {
            Ok(_) => self.metrics.increment(MetricName::ImageSuccess),
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "Image probe failed");
                self.metrics.increment(MetricName::ImageFail);
            }
        }

        result
    }
}
