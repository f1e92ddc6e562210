//! Prometheus metrics for application observability.
//!
//! Metrics are exposed via a dedicated HTTP listener (default port 9090,
//! disabled with `METRICS_PORT=0`).
//!
//! # Available Metrics
//!
//! - `ipecho_requests_total` - Completed requests (label: status)
//! - `ipecho_rate_limit_rejections_total` - Requests rejected with 429
//! - `ipecho_request_duration_seconds` - Request latency histogram

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "ipecho_requests_total";
    pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "ipecho_rate_limit_rejections_total";
    pub const REQUEST_DURATION_SECONDS: &str = "ipecho_request_duration_seconds";
}

/// Initialize the Prometheus metrics exporter.
///
/// Sets up metric descriptions and starts the Prometheus HTTP listener on
/// the given address.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::REQUESTS_TOTAL, "Total completed requests");
    describe_counter!(
        names::RATE_LIMIT_REJECTIONS_TOTAL,
        "Total requests rejected by the rate limiter"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "Request duration in seconds"
    );

    Ok(())
}

/// Record a completed request with its status code and latency.
pub fn record_request(status: u16, duration_secs: f64) {
    counter!(names::REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS).record(duration_secs);
}

/// Record a rate-limit rejection.
pub fn record_rate_limit_rejection() {
    counter!(names::RATE_LIMIT_REJECTIONS_TOTAL).increment(1);
}
