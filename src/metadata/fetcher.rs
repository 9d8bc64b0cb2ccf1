use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::LOCATION;
use reqwest::{Client as ReqwestClient, Response};
use url::Url;

use super::policy::AddressGuard;
use crate::error::PipelineError;
use crate::metrics::{MetricName, Metrics};

/// Redirect hops followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 10;

/// GET `url`, following redirects by hand so `check_hop` sees every URL
/// before it is requested, the first one included.
///
/// `client` must be built with `redirect::Policy::none()`. `timeout`
/// overrides the client timeout for each hop.
pub async fn get_following_redirects<C, Fut>(
    client: &ReqwestClient,
    url: &Url,
    timeout: Option<Duration>,
    check_hop: C,
) -> Result<Response, PipelineError>
where
    C: Fn(Url) -> Fut,
    Fut: Future<Output = Result<(), PipelineError>>,
{
    let mut current = url.clone();

    for _ in 0..=MAX_REDIRECTS {
        check_hop(current.clone()).await?;

        let mut request = client.get(current.as_str());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Network(describe(&e)))?;

        if !response.status().is_redirection() {
            return Ok(response);
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(response);
        };

        let next = current
            .join(location)
            .map_err(|e| PipelineError::InvalidUrl(format!("bad redirect target: {e}")))?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(PipelineError::InvalidUrl(format!(
                "redirect to unsupported scheme '{}'",
                next.scheme()
            )));
        }
        tracing::debug!(from = %current, to = %next, "Following redirect");
        current = next;
    }

    Err(PipelineError::Network("too many redirects".into()))
}

/// Downloads page bodies. No retries: a failed fetch fails that URL.
pub struct Fetcher {
    client: ReqwestClient,
    guard: AddressGuard,
    metrics: Arc<dyn Metrics>,
}

impl Fetcher {
    /// `client` carries the service user-agent and request timeout.
    pub fn new(client: ReqwestClient, guard: AddressGuard, metrics: Arc<dyn Metrics>) -> Self {
        Fetcher {
            client,
            guard,
            metrics,
        }
    }

    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }

    pub async fn fetch(&self, url: &Url) -> Result<String, PipelineError> {
        let started = Instant::now();
        let result = self.fetch_body(url).await;

        self.metrics.timing(MetricName::FetchTime, started.elapsed());
        match &result {
            Ok(_) => self.metrics.increment(MetricName::FetchSuccess),
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "Failed to fetch URL");
                self.metrics.increment(MetricName::FetchFail);
            }
        }

        result
    }

    async fn fetch_body(&self, url: &Url) -> Result<String, PipelineError> {
        let guard = self.guard;
        let response = get_following_redirects(&self.client, url, None, move |hop| async move {
            guard.check(&hop).await
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::FetchStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| PipelineError::Network(describe(&e)))
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    }
}
