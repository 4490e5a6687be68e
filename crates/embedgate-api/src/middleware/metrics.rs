//! # Prometheus Metrics
//!
//! Prometheus registry for the gateway. HTTP-level metrics are recorded in
//! middleware; admission outcomes, audit write failures, and limiter
//! degradation are pushed by the gateway components as they happen.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct GatewayMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,

    // -- Admission metrics --
    bootstrap_outcomes_total: IntCounterVec,
    audit_write_failures_total: IntCounter,
    rate_limiter_degraded_total: IntCounter,
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics")
            .field("requests", &self.requests())
            .field("audit_write_failures", &self.audit_write_failures())
            .field("rate_limiter_degraded", &self.rate_limiter_degraded())
            .finish()
    }
}

impl GatewayMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("embedgate_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "embedgate_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let bootstrap_outcomes_total = IntCounterVec::new(
            Opts::new(
                "embedgate_bootstrap_outcomes_total",
                "Bootstrap admission decisions by audit action",
            ),
            &["action"],
        )
        .expect("metric can be created");

        let audit_write_failures_total = IntCounter::new(
            "embedgate_audit_write_failures_total",
            "Audit events that could not be written",
        )
        .expect("metric can be created");

        let rate_limiter_degraded_total = IntCounter::new(
            "embedgate_rate_limiter_degraded_total",
            "Rate limit checks that could not reach the bucket store",
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(bootstrap_outcomes_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(audit_write_failures_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(rate_limiter_degraded_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                bootstrap_outcomes_total,
                audit_write_failures_total,
                rate_limiter_degraded_total,
            }),
        }
    }

    /// Total HTTP requests observed (sum across all labels).
    pub fn requests(&self) -> u64 {
        self.inner
            .http_requests_total
            .collect()
            .iter()
            .flat_map(|mf| mf.get_metric())
            .map(|m| m.get_counter().get_value() as u64)
            .sum()
    }

    /// Count one admission decision.
    pub fn record_outcome(&self, action: &str) {
        self.inner
            .bootstrap_outcomes_total
            .with_label_values(&[action])
            .inc();
    }

    /// Decisions recorded for `action`.
    pub fn outcomes(&self, action: &str) -> u64 {
        self.inner
            .bootstrap_outcomes_total
            .with_label_values(&[action])
            .get()
    }

    /// Count one failed audit write.
    pub fn audit_write_failed(&self) {
        self.inner.audit_write_failures_total.inc();
    }

    /// Failed audit writes so far.
    pub fn audit_write_failures(&self) -> u64 {
        self.inner.audit_write_failures_total.get()
    }

    /// Count one degraded limiter check.
    pub fn limiter_degraded(&self) {
        self.inner.rate_limiter_degraded_total.inc();
    }

    /// Degraded limiter checks so far.
    pub fn rate_limiter_degraded(&self) -> u64 {
        self.inner.rate_limiter_degraded_total.get()
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that records HTTP request metrics.
///
/// Labels use the matched route template, so arbitrary request paths cannot
/// inflate label cardinality.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<GatewayMetrics>().cloned();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(
            &method,
            &path,
            response.status().as_u16(),
            start.elapsed().as_secs_f64(),
        );
    }

    response
}
