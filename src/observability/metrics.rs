//! Metrics collection and exposition.
//!
//! # Metrics
//! - `routemux_requests_total` (counter): requests by method, status, route
//! - `routemux_request_duration_seconds` (histogram): dispatch latency
//! - `routemux_context_allocations_total` (counter): pool misses
//!
//! Unmatched requests are labelled with route `none`, so label
//! cardinality is bounded by the number of registered patterns.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "routemux_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "routemux_request_duration_seconds";
pub const CONTEXT_ALLOCATIONS_TOTAL: &str = "routemux_context_allocations_total";

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let status = status.to_string();
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.clone(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "status" => status,
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_context_allocation() {
    counter!(CONTEXT_ALLOCATIONS_TOTAL).increment(1);
}
