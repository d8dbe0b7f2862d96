//! Metrics collection and exposition.
//!
//! # Metrics
//! - `devproxy_requests_total` (counter): requests by method, status, target kind
//! - `devproxy_request_duration_seconds` (histogram): end-to-end latency
//! - `devproxy_fallbacks_total` (counter): alternative paths, pending rules, 404 pages
//! - `devproxy_table_reloads_total` (counter): hot reloads by table and outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, target: &str, start: Instant) {
    metrics::counter!(
        "devproxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "target" => target.to_string()
    )
    .increment(1);
    metrics::histogram!("devproxy_request_duration_seconds", "target" => target.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// `kind` is one of `alternative`, `rule`, `not_found`.
pub fn record_fallback(kind: &'static str) {
    metrics::counter!("devproxy_fallbacks_total", "kind" => kind).increment(1);
}

pub fn record_reload(table: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("devproxy_table_reloads_total", "table" => table, "outcome" => outcome).increment(1);
}
