use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::join_all;
use reqwest::{redirect, Client as ReqwestClient};
use tokio::sync::Semaphore;
use url::Url;

use super::document::Document;
use super::extractor::{MetadataExtractor, OpenGraphExtractor};
use super::fetcher::Fetcher;
use super::normalizer::{normalize, NormalizedPage};
use super::policy::{AddressGuard, PolicyGate};
use super::prober::{HttpImageProber, ImageProber};
use crate::config::Config;
use crate::error::{AppError, AppResult, PipelineError};
use crate::metrics::Metrics;
use crate::models::{BatchResponse, ImageInfo, PageMetadata, UrlResult};

pub const URLS_REQUIRED: &str =
    "The post body must be a JSON payload in the following format: {urls: [\"http://example.com\"]}.";

pub fn max_urls_message(max_urls: usize) -> String {
    format!("A maximum of {max_urls} urls can be sent for processing in one call.")
}

/// Reject empty or oversized batches before any network traffic.
pub fn validate_batch(urls: &[String], max_urls: usize) -> AppResult<()> {
    if urls.is_empty() {
        return Err(AppError::Validation(URLS_REQUIRED.into()));
    }
    if urls.len() > max_urls {
        return Err(AppError::Validation(max_urls_message(max_urls)));
    }
    Ok(())
}

/// Parse a requested URL. Only absolute http(s) URLs with a host are fetched.
pub fn parse_target(raw: &str) -> Result<Url, PipelineError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| PipelineError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(PipelineError::InvalidUrl(format!(
                "unsupported scheme '{scheme}'"
            )))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(PipelineError::InvalidUrl("URL has no host".into()));
    }

    Ok(parsed)
}

/// Runs the per-URL metadata pipeline and fans batches out across it.
///
/// Built once at startup and shared behind an `Arc`; it holds no per-request
/// state.
pub struct MetadataService {
    fetcher: Fetcher,
    gate: PolicyGate,
    extractor: Arc<dyn MetadataExtractor>,
    prober: Arc<dyn ImageProber>,
    limiter: Option<Arc<Semaphore>>,
    max_urls: usize,
}

impl MetadataService {
    /// Build a service with the default extractor and HTTP image prober.
    pub fn new(config: &Config, metrics: Arc<dyn Metrics>) -> AppResult<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let guard = AddressGuard::new(config.allow_private_networks, config.dns_timeout);
        let gate = PolicyGate::new(
            config.blacklist.clone(),
            guard,
            config.respect_robots,
            config.robots_user_agent.clone(),
            config.robots_timeout,
            metrics.clone(),
        );
        let prober =
            HttpImageProber::new(client.clone(), config.image_timeout, guard, metrics.clone());

        Ok(MetadataService {
            fetcher: Fetcher::new(client, guard, metrics),
            gate,
            extractor: Arc::new(OpenGraphExtractor),
            prober: Arc::new(prober),
            limiter: config
                .max_concurrent_fetches
                .map(|n| Arc::new(Semaphore::new(n))),
            max_urls: config.max_urls,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn ImageProber>) -> Self {
        self.prober = prober;
        self
    }

    pub fn max_urls(&self) -> usize {
        self.max_urls
    }

    // ── Batch ──────────────────────────────────────────────────────────────

    /// Process every URL concurrently and wait for all of them to settle.
    ///
    /// Per-URL failures land in `url_errors`, including a pipeline task that
    /// panicked. Only an invalid batch fails the call.
    pub async fn run(self: &Arc<Self>, urls: Vec<String>) -> AppResult<BatchResponse> {
        validate_batch(&urls, self.max_urls)?;

        let mut seen = HashSet::new();
        let (requested, handles): (Vec<_>, Vec<_>) = urls
            .into_iter()
            .filter(|url| seen.insert(url.clone()))
            .map(|url| {
                let service = Arc::clone(self);
                let task_url = url.clone();
                (url, tokio::spawn(async move { service.get_url_metadata(task_url).await }))
            })
            .unzip();

        let mut response = BatchResponse::new();
        for (url, joined) in requested.into_iter().zip(join_all(handles).await) {
            let result = joined.unwrap_or_else(|e| {
                let reason = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                        .unwrap_or_else(|| "task panicked".to_string())
                } else {
                    e.to_string()
                };
                tracing::error!(url = %url, error = %reason, "Metadata pipeline crashed");
                UrlResult {
                    url,
                    outcome: Err(PipelineError::Crashed(reason)),
                }
            });
            response.insert(result);
        }

        Ok(response)
    }

    // ── Pipeline ───────────────────────────────────────────────────────────

    /// Run one URL to a settled result. Never fails.
    pub async fn get_url_metadata(&self, url: String) -> UrlResult {
        let _permit = match &self.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };

        let outcome = self.fetch_metadata(&url).await;
        match &outcome {
            Ok(metadata) => tracing::debug!(url = %url, metadata = ?metadata, "Generated metadata"),
            Err(e) => tracing::warn!(url = %url, error = %e, "Metadata pipeline failed"),
        }

        UrlResult { url, outcome }
    }

    async fn fetch_metadata(&self, url: &str) -> Result<PageMetadata, PipelineError> {
        let target = parse_target(url)?;
        self.gate.check(self.fetcher.client(), &target).await?;
        let body = self.fetcher.fetch(&target).await?;
        let page = self.extract_page(&target, url, &body)?;
        Ok(self.attach_image(page).await)
    }

    /// Parse, extract and normalize. Synchronous; the document is dropped
    /// before returning.
    pub fn extract_page(
        &self,
        target: &Url,
        original_url: &str,
        body: &str,
    ) -> Result<NormalizedPage, PipelineError> {
        let extracted = catch_unwind(AssertUnwindSafe(|| {
            let document = Document::parse(body);
            self.extractor.extract(&document, target)
        }))
        .map_err(|panic| {
            PipelineError::Parse(
                panic_message(panic.as_ref()).unwrap_or_else(|| "Failed to parse HTML".to_string()),
            )
        })??;

        Ok(normalize(target, original_url, extracted))
    }

    /// Probe the preview image. A failed probe drops the image, nothing more.
    async fn attach_image(&self, page: NormalizedPage) -> PageMetadata {
        let NormalizedPage {
            mut metadata,
            preview_image,
        } = page;

        if let Some(image_url) = preview_image {
            if let Ok(dims) = self.prober.probe(&image_url).await {
                metadata.images = vec![ImageInfo {
                    url: image_url,
                    width: dims.width,
                    height: dims.height,
                }];
            }
        }

        metadata
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> Option<String> {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
}
