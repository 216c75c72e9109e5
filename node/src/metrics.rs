//! # Prometheus Metrics
//!
//! Request counters, latency and chain-node failures for the Construction
//! API. Scraped at `/metrics` on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Outcome label for a request that returned 200.
pub const OUTCOME_OK: &str = "ok";
/// Outcome label for a request rejected with 400.
pub const OUTCOME_REJECTED: &str = "rejected";
/// Outcome label for a chain-node failure (500, retriable).
pub const OUTCOME_NODE_ERROR: &str = "node_error";

/// Metric handles shared by every handler.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Requests by endpoint and outcome.
    pub requests_total: IntCounterVec,
    /// Handler latency by endpoint, in seconds.
    pub request_latency_seconds: HistogramVec,
    /// Retriable chain-node failures by endpoint.
    pub node_failures_total: IntCounterVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("thor_mesh".into()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Construction API requests by endpoint and outcome"),
            &["endpoint", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "request_latency_seconds",
                "Construction API handler latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_latency_seconds.clone()))?;

        let node_failures_total = IntCounterVec::new(
            Opts::new(
                "node_failures_total",
                "Retriable chain-node failures surfaced to callers",
            ),
            &["endpoint"],
        )?;
        registry.register(Box::new(node_failures_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_latency_seconds,
            node_failures_total,
        })
    }

    /// Records one finished request.
    pub fn observe(&self, endpoint: &str, outcome: &str, seconds: f64) {
        self.requests_total
            .with_label_values(&[endpoint, outcome])
            .inc();
        self.request_latency_seconds
            .with_label_values(&[endpoint])
            .observe(seconds);
        if outcome == OUTCOME_NODE_ERROR {
            self.node_failures_total.with_label_values(&[endpoint]).inc();
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
