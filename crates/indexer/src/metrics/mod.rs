//! Indexer Prometheus Metrics
//!
//! Counters and histograms for cycles, probes, endpoint resolutions and
//! validator tool invocations, with an optional Prometheus HTTP exporter.

pub mod prometheus_metrics;

pub use prometheus_metrics::*;

use anyhow::Result;
use common::config::MetricsConfig;
use std::sync::Arc;

/// Shared handle to the indexer's metrics
#[derive(Clone)]
pub struct IndexerMetrics {
    prometheus: Arc<IndexerPrometheusMetrics>,
    config: MetricsConfig,
}

impl Default for IndexerMetrics {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl IndexerMetrics {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            prometheus: Arc::new(IndexerPrometheusMetrics::new()),
            config,
        }
    }

    pub fn prometheus(&self) -> Arc<IndexerPrometheusMetrics> {
        self.prometheus.clone()
    }

    /// Install the Prometheus exporter when metrics are enabled
    pub fn start_server(&self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("Metrics collection disabled");
            return Ok(());
        }

        let prometheus_config = self
            .config
            .prometheus
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Prometheus configuration is required"))?;
        let address = prometheus_config.listen_address();

        let socket_addr: std::net::SocketAddr = address.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(socket_addr)
            .install()?;

        tracing::info!("Metrics server started on http://{}/metrics", address);
        Ok(())
    }
}
