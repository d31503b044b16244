//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, status
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_fragments_removed_total` (counter): removals by kind
//! - `proxy_normalize_fail_open_total` (counter): target bodies forwarded as-is
//!
//! # Design Decisions
//! - Recording is always on; without an installed exporter it is a no-op
//! - Route label is the target name, or "passthrough"

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::normalize::RemovalCounts;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record what normalization removed from one request.
pub fn record_removals(counts: &RemovalCounts) {
    if counts.prefixes_removed > 0 {
        ::metrics::counter!("proxy_fragments_removed_total", "kind" => "timestamp_prefix")
            .increment(counts.prefixes_removed as u64);
    }
    if counts.keys_removed > 0 {
        ::metrics::counter!("proxy_fragments_removed_total", "kind" => "volatile_key")
            .increment(counts.keys_removed as u64);
    }
}

/// Record a target body that could not be parsed and was forwarded as-is.
pub fn record_fail_open() {
    ::metrics::counter!("proxy_normalize_fail_open_total").increment(1);
}
