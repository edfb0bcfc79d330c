//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tube_http_requests_total` (counter): inbound requests by route, method, status
//! - `tube_http_request_duration_seconds` (histogram): inbound latency
//! - `tube_upstream_requests_total` (counter): outbound attempts by target, status
//! - `tube_upstream_request_duration_seconds` (histogram): outbound attempt latency
//! - `tube_rate_limited_total` (counter): 429 responses by route
//! - `tube_circuit_breaker_rejected_total` (counter): fail-fast calls by target
//! - `tube_circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder (e.g. in tests) every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::resilience::circuit_breaker::CircuitState;

/// Latency buckets (seconds), tuned for sub-second upstream calls.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.3, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

/// Record one inbound request.
pub fn record_http_request(route: &str, method: &str, status: u16, start: Instant) {
    let labels = [
        ("route", route.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("tube_http_requests_total", &labels).increment(1);
    histogram!("tube_http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record one outbound attempt. `status` is the HTTP code or an outcome
/// class such as `timeout`.
pub fn record_upstream_request(target: &str, status: &str, start: Instant) {
    let labels = [("target", target.to_string()), ("status", status.to_string())];
    counter!("tube_upstream_requests_total", &labels).increment(1);
    histogram!("tube_upstream_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    counter!("tube_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_breaker_rejected(target: &str) {
    counter!("tube_circuit_breaker_rejected_total", "target" => target.to_string()).increment(1);
}

pub fn record_breaker_state(target: &str, state: CircuitState) {
    gauge!("tube_circuit_breaker_state", "target" => target.to_string()).set(f64::from(state as u8));
}
