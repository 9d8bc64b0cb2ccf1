use std::sync::Arc;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use page_metadata_service::config::Config;
use page_metadata_service::metadata::MetadataService;
use page_metadata_service::metrics::{MetricName, Metrics, PrometheusMetrics};
use page_metadata_service::routes;
use page_metadata_service::state::AppState;

#[tokio::main]
async fn main() {
    // JSON logs in production, human-readable in dev.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "page_metadata_service=info,tower_http=info"
            .parse()
            .unwrap()
    });

    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Page metadata service starting...");

    let config = Config::from_env().expect("Failed to load configuration");
    info!(
        max_urls = config.max_urls,
        respect_robots = config.respect_robots,
        blacklisted_domains = config.blacklist.len(),
        "Configuration loaded"
    );

    // The layer installs the global recorder PrometheusMetrics writes to,
    // so it must exist before the first pipeline metric is emitted.
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    let metrics = Arc::new(PrometheusMetrics);
    metrics.increment(MetricName::ServiceStart);

    let service =
        MetadataService::new(&config, metrics).expect("Failed to build metadata service");

    // CORS: permissive in dev, restrictive in production.
    let cors = if config.is_dev {
        info!("CORS: permissive (dev mode)");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let addr = config.server_addr();

    let app = routes::router(AppState::new(service))
        .route(
            "/metrics",
            get(move || async move { metric_handle.render() }),
        )
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
