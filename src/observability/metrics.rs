//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (RPS, latency, upstream failures)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by path template, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by path template, method
//! - `gateway_upstream_errors_total` (counter): failed upstream calls by kind
//!
//! # Design Decisions
//! - Labels use the route template, never the concrete path, to bound cardinality
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(path: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// `kind` is one of `timeout`, `connect`, `body`.
pub fn record_upstream_error(kind: &'static str) {
    counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}
