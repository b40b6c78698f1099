//! Prometheus metrics.
//!
//! Recording goes through the `metrics` facade and is fire-and-forget: when no
//! recorder is installed (tests, tools) every call is a no-op, and a recording
//! call can never fail the operation that triggered it.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `pvz_receptions_created_total` - Receptions opened
//! - `pvz_products_added_total` - Products taken in
//! - `pvz_pickup_points_created_total` - Pickup points registered
//! - `pvz_http_requests_total{method,path,status}` - Handled HTTP requests
//!
//! ## Histograms
//! - `pvz_http_request_duration_seconds{method,path}` - HTTP handling latency

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

pub const RECEPTIONS_CREATED: &str = "pvz_receptions_created_total";
pub const PRODUCTS_ADDED: &str = "pvz_products_added_total";
pub const PICKUP_POINTS_CREATED: &str = "pvz_pickup_points_created_total";
pub const HTTP_REQUESTS: &str = "pvz_http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "pvz_http_request_duration_seconds";

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the process-wide Prometheus recorder and return a render handle.
///
/// Must be called at most once per process; a second call fails with
/// [`MetricsError::Install`].
pub fn install() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    ::tracing::info!("prometheus recorder installed");
    Ok(handle)
}

fn register_metrics() {
    describe_counter!(RECEPTIONS_CREATED, "Total number of receptions opened");
    describe_counter!(PRODUCTS_ADDED, "Total number of products taken in");
    describe_counter!(PICKUP_POINTS_CREATED, "Total number of pickup points registered");
    describe_counter!(HTTP_REQUESTS, "Total number of handled HTTP requests");
    describe_histogram!(HTTP_REQUEST_DURATION, "HTTP request handling latency");
}

pub fn reception_created() {
    counter!(RECEPTIONS_CREATED).increment(1);
}

pub fn product_added() {
    counter!(PRODUCTS_ADDED).increment(1);
}

pub fn pickup_point_created() {
    counter!(PICKUP_POINTS_CREATED).increment(1);
}

pub fn http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    counter!(
        HTTP_REQUESTS,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        HTTP_REQUEST_DURATION,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(elapsed.as_secs_f64());
}
