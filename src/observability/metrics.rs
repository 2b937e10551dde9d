//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): requests rejected by the limiter
//! - `gateway_rate_limit_tracked_clients` (gauge): client keys held in memory
//! - `gateway_security_decisions_total` (counter): by outcome
//! - `gateway_policy_failures_total` (counter): by failure kind
//! - `gateway_audit_dispatch_failures_total` (counter)
//! - `gateway_sink_failures_total` (counter): by sink and failure kind
//! - `gateway_model_calls_total` / `gateway_model_call_duration_seconds`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("gateway_rate_limit_tracked_clients").set(count as f64);
}

/// `outcome` is one of `allowed`, `blocked`, `fallback`, `unavailable`, `skipped`.
pub fn record_security_decision(outcome: &'static str) {
    counter!("gateway_security_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_policy_failure(kind: &'static str) {
    counter!("gateway_policy_failures_total", "kind" => kind).increment(1);
}

pub fn record_audit_failure() {
    counter!("gateway_audit_dispatch_failures_total").increment(1);
}

/// `sink` is `mongodb` or `kafka`.
pub fn record_sink_failure(sink: &'static str, kind: &'static str) {
    counter!("gateway_sink_failures_total", "sink" => sink, "kind" => kind).increment(1);
}

pub fn record_model_call(outcome: &'static str, start: Instant) {
    counter!("gateway_model_calls_total", "outcome" => outcome).increment(1);
    histogram!("gateway_model_call_duration_seconds").record(start.elapsed().as_secs_f64());
}
