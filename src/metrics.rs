// src/metrics.rs
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with its own HTTP listener serving `/metrics`.
/// Must be called inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    // Default buckets keep the histogram API stable across exporter versions.
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("prometheus: install exporter on {addr}"))?;
    crate::ingest::ensure_metrics_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
