//! Metrics collection and exposition.
//!
//! # Metrics
//! - `readiness_probe_total` (counter): probe runs by probe, status
//! - `readiness_probe_duration_seconds` (histogram): probe latency by probe
//! - `http_request_timeouts_total` (counter): requests answered with the timeout response
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed (see [`init_metrics`]).

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::probe::CheckResult;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_probe(result: &CheckResult) {
    metrics::counter!(
        "readiness_probe_total",
        "probe" => result.name.clone(),
        "status" => result.status.as_str()
    )
    .increment(1);

    metrics::histogram!("readiness_probe_duration_seconds", "probe" => result.name.clone())
        .record(result.duration.as_secs_f64());
}

pub fn record_request_timeout() {
    metrics::counter!("http_request_timeouts_total").increment(1);
}
