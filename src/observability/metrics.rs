//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_operations_total` (counter): calls by operation, table, outcome
//! - `gateway_operation_duration_seconds` (histogram): latency per operation
//! - `gateway_cache_events_total` (counter): hit, miss, coalesced, invalidated
//! - `gateway_retries_total` (counter): retries by operation
//! - `gateway_results_truncated_total`, `gateway_slow_queries_total` (counters)
//! - `audit_flushes_total` (counter): ok, failed, skipped
//! - `audit_records_dropped_total` (counter)
//! - `security_threats_total` (counter): by category and severity
//! - `rate_limit_denied_total` (counter): by limiter
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests and library users free
//!   of exporter setup
//! - The daemon installs the Prometheus exporter on its own listener

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and start its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of one gateway call.
pub fn record_operation(operation: &'static str, table: &str, success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "gateway_operations_total",
        "operation" => operation,
        "table" => table.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_operation_duration_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
}

/// Record a cache event: `hit`, `miss`, `coalesced` or `invalidated`.
pub fn record_cache_event(event: &'static str) {
    counter!("gateway_cache_events_total", "event" => event).increment(1);
}

pub fn record_retry(operation: &'static str) {
    counter!("gateway_retries_total", "operation" => operation).increment(1);
}

pub fn record_truncated_result() {
    counter!("gateway_results_truncated_total").increment(1);
}

pub fn record_slow_query() {
    counter!("gateway_slow_queries_total").increment(1);
}

/// Record an audit flush outcome: `ok`, `failed` or `skipped`.
pub fn record_audit_flush(outcome: &'static str) {
    counter!("audit_flushes_total", "outcome" => outcome).increment(1);
}

pub fn record_audit_dropped(count: usize) {
    counter!("audit_records_dropped_total").increment(count as u64);
}

pub fn record_threat(category: &'static str, severity: &'static str) {
    counter!("security_threats_total", "category" => category, "severity" => severity).increment(1);
}

pub fn record_rate_limited(limiter: &'static str) {
    counter!("rate_limit_denied_total", "limiter" => limiter).increment(1);
}
