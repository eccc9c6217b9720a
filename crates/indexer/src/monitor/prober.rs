use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::bounded::run_bounded;
use super::types::ProbeResult;
use crate::metrics::{IndexerPrometheusMetrics, ProbeOutcome};
use crate::rpc::JsonRpcClient;

/// Block height and sync status checks against validator endpoints
pub struct HealthProber {
    client: JsonRpcClient,
    metrics: Arc<IndexerPrometheusMetrics>,
}

impl HealthProber {
    pub fn new(client: JsonRpcClient, metrics: Arc<IndexerPrometheusMetrics>) -> Self {
        Self { client, metrics }
    }

    /// Probe one endpoint; the two checks run concurrently and fail independently
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let (height, syncing) =
            tokio::join!(self.client.block_number(url), self.client.syncing(url));

        let mut result = ProbeResult::default();
        let mut latency: Option<Duration> = None;

        match height {
            Ok(height) => {
                result.up = true;
                result.block_number = Some(height.number);
                result.status_code = Some(height.status);
                result.response_time_ms = Some(height.elapsed.as_millis() as u64);
                latency = Some(height.elapsed);
            }
            Err(e) => {
                debug!(url = %url, kind = ?e.kind, error = %e, "Block number check failed");
                result.status_code = Some(e.status_or_sentinel());
            }
        }

        match syncing {
            Ok(syncing) => result.is_syncing = Some(syncing),
            Err(e) => debug!(url = %url, kind = ?e.kind, "Sync status check failed"),
        }

        let outcome = if result.up {
            ProbeOutcome::Reachable
        } else {
            ProbeOutcome::Unreachable
        };
        self.metrics.record_probe(outcome, latency);

        result
    }

    /// Probe `(key, url)` targets with at most `width` probes in flight
    pub async fn probe_all<K: Send>(
        &self,
        targets: Vec<(K, String)>,
        width: usize,
    ) -> Vec<(K, ProbeResult)> {
        let total = targets.len();
        let results = run_bounded(targets, width, |(key, url)| async move {
            let result = self.probe(&url).await;
            (key, result)
        })
        .await;

        let up = results.iter().filter(|(_, r)| r.up).count();
        info!(total, up, "Probed validator endpoints");
        results
    }
}
