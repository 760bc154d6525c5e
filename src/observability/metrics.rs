//! Metrics collection and exposition.
//!
//! # Metrics
//! - `route_reload_requests_total` (counter): requests by method, status
//! - `route_reload_request_duration_seconds` (histogram): dispatch latency
//! - `route_reload_reloads_total` (counter): reloads by outcome
//! - `route_reload_generation` (gauge): id of the generation being served
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus endpoint is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "route_reload_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "route_reload_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_reload(outcome: &'static str) {
    metrics::counter!("route_reload_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_generation(id: u64) {
    metrics::gauge!("route_reload_generation").set(id as f64);
}
