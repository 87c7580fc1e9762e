//! Prometheus metrics for the query API.
//!
//! Exposes:
//! - `graphrag_http_request_duration_seconds` (histogram, by route)
//! - `graphrag_http_requests_total` (counter, by route and status)
//! - `graphrag_http_requests_inflight` (gauge, by route)
//! - process metrics via `process` collector
//!
//! Streaming responses are timed until their headers are ready, not until
//! the last fragment is sent.

use std::time::Instant;

use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tracing::warn;

use crate::{Error, Result};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 5ms up to ~80s.
    let buckets =
        prometheus::exponential_buckets(0.005, 2.0, 15).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "graphrag_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["route"],
        buckets
    )
    .expect("failed to register request duration histogram")
});

static REQUEST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "graphrag_http_requests_total",
        "Total HTTP requests by route and status",
        &["route", "status"]
    )
    .expect("failed to register request counter")
});

static REQUEST_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "graphrag_http_requests_inflight",
        "Number of in-flight HTTP requests",
        &["route"]
    )
    .expect("failed to register inflight gauge")
});

/// Ensure collectors are registered.
pub fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&REQUEST_DURATION);
    Lazy::force(&REQUEST_TOTAL);
    Lazy::force(&REQUEST_INFLIGHT);
}

/// One in-flight request. Holding it keeps the in-flight gauge raised; it is
/// lowered on drop, including when the request future is cancelled.
#[must_use]
pub struct RequestGuard {
    route: &'static str,
    started: Instant,
}

impl RequestGuard {
    pub fn start(route: &'static str) -> Self {
        init_collectors();
        REQUEST_INFLIGHT.with_label_values(&[route]).inc();
        Self {
            route,
            started: Instant::now(),
        }
    }

    /// Record duration and status for a completed request.
    pub fn finish(self, status: u16) {
        REQUEST_DURATION
            .with_label_values(&[self.route])
            .observe(self.started.elapsed().as_secs_f64());
        REQUEST_TOTAL
            .with_label_values(&[self.route, &status.to_string()])
            .inc();
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        REQUEST_INFLIGHT.with_label_values(&[self.route]).dec();
    }
}

/// Current in-flight count for `route`.
pub fn inflight(route: &str) -> i64 {
    init_collectors();
    REQUEST_INFLIGHT.with_label_values(&[route]).get()
}

/// Text exposition of every registered metric, with its content type.
pub fn render() -> Result<(String, Vec<u8>)> {
    init_collectors();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| Error::HttpError(format!("Failed to encode metrics: {}", e)))?;
    Ok((encoder.format_type().to_string(), buffer))
}
