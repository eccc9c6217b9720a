use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use super::prober::HealthProber;
use super::reconciler::DirectoryReconciler;
use super::resolver::EndpointResolver;
use super::types::{CycleError, CycleSummary};
use crate::metrics::{IndexerPrometheusMetrics, ProbeOutcome};
use crate::persistence::{CycleRecord, Network, NewMeasurement, RpcAssignment, Store};

/// Runs one reconcile, resolve, probe and persist pass
pub struct CycleOrchestrator {
    reconciler: DirectoryReconciler,
    resolver: EndpointResolver,
    prober: HealthProber,
    store: Arc<dyn Store>,
    metrics: Arc<IndexerPrometheusMetrics>,
    batch_size: usize,
}

impl CycleOrchestrator {
    pub fn new(
        reconciler: DirectoryReconciler,
        resolver: EndpointResolver,
        prober: HealthProber,
        store: Arc<dyn Store>,
        metrics: Arc<IndexerPrometheusMetrics>,
        batch_size: usize,
    ) -> Self {
        Self {
            reconciler,
            resolver,
            prober,
            store,
            metrics,
            batch_size,
        }
    }

    pub async fn run_cycle(&self, network: &Network) -> Result<CycleSummary, CycleError> {
        let measurement_id = Uuid::new_v4();
        let span = info_span!(
            "cycle",
            measurement_id = %measurement_id,
            network = %network.name
        );
        self.run_cycle_inner(network, measurement_id)
            .instrument(span)
            .await
    }

    async fn run_cycle_inner(
        &self,
        network: &Network,
        measurement_id: Uuid,
    ) -> Result<CycleSummary, CycleError> {
        let started = Instant::now();

        let (snapshot, _) = self.reconciler.reconcile(network).await?;
        let addresses = snapshot.validator_addresses();
        self.metrics.set_elected_validators(addresses.len());

        let mut validators = self
            .store
            .validators_by_addresses(network.id, &addresses)
            .await?;

        let resolved: HashMap<String, String> = self
            .resolver
            .resolve_all(network.id, &addresses, self.batch_size)
            .await
            .into_iter()
            .filter_map(|(address, endpoint)| endpoint.map(|e| (address, e.url)))
            .collect();

        for validator in &mut validators {
            let Some(url) = resolved.get(&validator.address) else {
                continue;
            };
            let current = validator.rpc_url.as_deref().map(str::trim);
            if current != Some(url.trim()) {
                debug!(validator = %validator.address, rpc_url = %url, "RPC URL changed");
                self.store
                    .update_validator_rpc_url(validator.id, url)
                    .await?;
                validator.rpc_url = Some(url.clone());
            }
        }

        let executed_at = Utc::now();

        let mut targets = Vec::new();
        let mut measurements = Vec::with_capacity(validators.len());
        let mut rpc_assignments = Vec::new();
        for validator in &validators {
            match validator.rpc_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => {
                    targets.push((validator.id, url.to_string()));
                    rpc_assignments.push(RpcAssignment {
                        validator_id: validator.id,
                        rpc_url: url.to_string(),
                    });
                }
                _ => {
                    self.metrics.record_probe(ProbeOutcome::Skipped, None);
                    measurements.push(NewMeasurement::unreachable(validator.id));
                }
            }
        }
        let unresolved = measurements.len();

        let probed = self.prober.probe_all(targets, self.batch_size).await;
        let reachable = probed.iter().filter(|(_, r)| r.up).count();
        measurements.extend(
            probed
                .into_iter()
                .map(|(validator_id, result)| result.into_measurement(validator_id)),
        );
        let unreachable = measurements.len() - reachable;

        let write = self
            .store
            .persist_cycle(&CycleRecord {
                network_id: network.id,
                executed_at,
                measurement_id,
                measurements,
                rpc_assignments,
            })
            .await?;

        let summary = CycleSummary {
            measurement_id,
            header_id: write.header_id,
            elected: addresses.len(),
            reachable,
            unreachable,
            unresolved,
            rpc_rows_appended: write.rpc_rows_appended,
            duration: started.elapsed(),
        };

        info!(
            header_id = summary.header_id,
            elected = summary.elected,
            reachable = summary.reachable,
            unreachable = summary.unreachable,
            unresolved = summary.unresolved,
            rpc_rows_appended = summary.rpc_rows_appended,
            duration_ms = summary.duration.as_millis() as u64,
            "Measurement cycle complete"
        );

        Ok(summary)
    }
}
