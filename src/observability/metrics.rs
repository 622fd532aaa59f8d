//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound requests by status, final target
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_retries_total` (counter): same-target retries by target
//! - `proxy_reroutes_total` (counter): target switches by the target left
//! - `proxy_target_healthy` (gauge): 1=healthy, 0=tainted
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; a no-op without a recorder
//! - Prometheus exporter installed only when enabled in config

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, target: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "status" => status.to_string(),
        "target" => target.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_retry(target: &str) {
    counter!("proxy_retries_total", "target" => target.to_string()).increment(1);
}

pub fn record_reroute(from_target: &str) {
    counter!("proxy_reroutes_total", "target" => from_target.to_string()).increment(1);
}

pub fn record_target_health(target: &str, healthy: bool) {
    gauge!("proxy_target_healthy", "target" => target.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
