// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use page_metadata_service::{
    config::Config,
    metadata::MetadataService,
    metrics::{MetricName, Metrics, NoopMetrics},
    routes,
    state::AppState,
};

pub const TITLE: &str = "An Example Page";
pub const DESCRIPTION: &str = "An example description";
pub const IMAGE_WIDTH: u32 = 456;
pub const IMAGE_HEIGHT: u32 = 123;

/// Config for tests: remote sites are wiremock servers on 127.0.0.1, so the
/// private-address guard is off.
pub fn test_config() -> Config {
    Config {
        allow_private_networks: true,
        fetch_timeout: Duration::from_secs(5),
        robots_timeout: Duration::from_secs(5),
        image_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

pub fn build_service(config: &Config) -> MetadataService {
    MetadataService::new(config, Arc::new(NoopMetrics)).expect("service should build")
}

/// Build the full application router around `service`.
pub fn create_app(service: MetadataService) -> Router {
    routes::router(AppState::new(service))
}

pub fn create_test_app(config: Config) -> Router {
    create_app(build_service(&config))
}

// ── Metrics ──────────────────────────────────────────────────────────────────

/// Counts every increment and timing call by name.
#[derive(Default)]
pub struct CountingMetrics {
    counts: Mutex<HashMap<MetricName, usize>>,
}

impl CountingMetrics {
    pub fn count(&self, name: MetricName) -> usize {
        self.counts.lock().unwrap().get(&name).copied().unwrap_or(0)
    }

    fn bump(&self, name: MetricName) {
        *self.counts.lock().unwrap().entry(name).or_insert(0) += 1;
    }
}

impl Metrics for CountingMetrics {
    fn increment(&self, name: MetricName) {
        self.bump(name);
    }

    fn timing(&self, name: MetricName, _elapsed: Duration) {
        self.bump(name);
    }
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, Some("application/json"), body.to_string()).await
}

pub async fn post_urls(app: Router, urls: &[String]) -> (StatusCode, Value) {
    post_json(app, "/v1/metadata", serde_json::json!({ "urls": urls })).await
}

pub async fn post_raw(
    app: Router,
    uri: &str,
    content_type: Option<&str>,
    body: String,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    let req = builder.body(Body::from(body)).unwrap();
    send(app, req).await
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ── Remote site helpers ──────────────────────────────────────────────────────

/// The example page used throughout: title, description, thumbnail and an
/// optional icon link.
pub fn page_html(image: Option<&str>, icon: Option<&str>) -> String {
    let image = image
        .map(|u| format!(r#"<meta name="thumbnail" content="{u}" />"#))
        .unwrap_or_default();
    let icon = icon
        .map(|u| format!(r#"<link rel="icon" href="{u}" />"#))
        .unwrap_or_default();
    format!(
        r#"
        <html>
          <head>
            <title>{TITLE}</title>
            <meta name="description" content="{DESCRIPTION}" />
            {image}
            {icon}
          </head>
          <body></body>
        </html>
        "#
    )
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub async fn mount_page(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub async fn mount_png(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(IMAGE_WIDTH, IMAGE_HEIGHT)),
        )
        .mount(server)
        .await;
}

pub async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// A route that must never be requested; verified when `server` drops.
pub async fn forbid(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

/// The `PageMetadata` JSON expected for `page_html` served at `{base}/good`.
pub fn expected_metadata(base: &str) -> Value {
    serde_json::json!({
        "url": format!("{base}/good"),
        "original_url": format!("{base}/good"),
        "provider_name": "127.0.0.1",
        "title": TITLE,
        "description": DESCRIPTION,
        "favicon_url": format!("{base}/rich-icon.png"),
        "images": [{
            "url": format!("{base}/preview.png"),
            "width": IMAGE_WIDTH,
            "height": IMAGE_HEIGHT,
        }],
    })
}
