use std::time::Duration;

use strum::IntoStaticStr;

/// Counters and timers emitted by the metadata pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MetricName {
    ServiceStart,
    BlacklistAllow,
    BlacklistDeny,
    RobotsAllowed,
    RobotsDisallowed,
    RobotsNotFound,
    FetchSuccess,
    FetchFail,
    FetchTime,
    ImageSuccess,
    ImageFail,
    ImageTime,
}

impl MetricName {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Fire-and-forget observability sink shared by every pipeline.
pub trait Metrics: Send + Sync {
    fn increment(&self, name: MetricName);
    fn timing(&self, name: MetricName, elapsed: Duration);
}

/// Discards everything. Used by tests and tools that have no recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment(&self, _name: MetricName) {}
    fn timing(&self, _name: MetricName, _elapsed: Duration) {}
}

/// Records through the global `metrics` recorder, which `axum-prometheus`
/// installs and exposes on `/metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl Metrics for PrometheusMetrics {
    fn increment(&self, name: MetricName) {
        metrics::counter!(format!("page_metadata_{}_total", name.as_str())).increment(1);
    }

    fn timing(&self, name: MetricName, elapsed: Duration) {
        metrics::histogram!(format!("page_metadata_{}_ms", name.as_str()))
            .record(elapsed.as_secs_f64() * 1000.0);
    }
}
