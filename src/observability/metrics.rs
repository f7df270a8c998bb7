//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pagewright_requests_total` (counter): requests by route and status
//! - `pagewright_request_duration_seconds` (histogram): render latency
//! - `pagewright_style_cache_hits_total` (counter)
//! - `pagewright_style_cache_misses_total` (counter)
//! - `pagewright_style_cache_purges_total` (counter)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "pagewright_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("pagewright_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_style_cache(hit: bool) {
    if hit {
        ::metrics::counter!("pagewright_style_cache_hits_total").increment(1);
    } else {
        ::metrics::counter!("pagewright_style_cache_misses_total").increment(1);
    }
}

pub fn record_purge() {
    ::metrics::counter!("pagewright_style_cache_purges_total").increment(1);
}
