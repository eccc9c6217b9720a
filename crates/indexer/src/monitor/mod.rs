//! # RPC Monitor
//!
//! Measurement engine of the indexer. Each cycle reconciles the validator
//! directory against the authoritative listing, resolves every elected
//! validator's RPC endpoint, probes the endpoints and persists the results
//! in a single transaction. Cycles start on fixed interval boundaries once
//! the chain has reached the configured migration block.

pub mod bounded;
pub mod orchestrator;
pub mod prober;
pub mod reconciler;
pub mod resolver;
pub mod scheduler;
pub mod types;

pub use orchestrator::CycleOrchestrator;
pub use prober::HealthProber;
pub use reconciler::DirectoryReconciler;
pub use resolver::{EndpointResolver, MetadataFetcher};
pub use scheduler::{duration_until_next_boundary, next_boundary_ms, wait_for_migration_block};
pub use types::*;

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::ScheduleConfig;
use crate::context::IndexerContext;
use crate::metrics::IndexerPrometheusMetrics;
use crate::persistence::{Network, Store};
use crate::rpc::ChainHeightSource;

/// Scheduler around the cycle orchestrator
pub struct RpcMonitor {
    orchestrator: CycleOrchestrator,
    chain: Arc<dyn ChainHeightSource>,
    store: Arc<dyn Store>,
    metrics: Arc<IndexerPrometheusMetrics>,
    network_name: String,
    schedule: ScheduleConfig,
}

impl RpcMonitor {
    pub fn new(context: &IndexerContext) -> Self {
        let store: Arc<dyn Store> = context.store.clone();
        let metrics = context.metrics.prometheus();
        let batch_size = context.config.schedule.batch_size;

        let reconciler = DirectoryReconciler::new(
            context.directory.clone(),
            context.chain.clone(),
            store.clone(),
            context.nodes.clone(),
        );
        let resolver = EndpointResolver::new(
            context.directory.clone(),
            context.metadata.clone(),
            store.clone(),
            context.nodes.clone(),
            metrics.clone(),
        );
        let prober = HealthProber::new(context.rpc.clone(), metrics.clone());

        Self {
            orchestrator: CycleOrchestrator::new(
                reconciler,
                resolver,
                prober,
                store.clone(),
                metrics.clone(),
                batch_size,
            ),
            chain: context.chain.clone(),
            store,
            metrics,
            network_name: context.config.network.name.clone(),
            schedule: context.config.schedule.clone(),
        }
    }

    /// Register the network and wait for the migration block
    pub async fn prepare(&self) -> Result<Network, CycleError> {
        let network = self.store.get_or_insert_network(&self.network_name).await?;
        info!(network = %network.name, network_id = network.id, "Monitoring network");

        wait_for_migration_block(
            self.chain.as_ref(),
            self.schedule.migration_block,
            self.schedule.migration_poll_interval(),
        )
        .await?;

        Ok(network)
    }

    async fn measure(&self, network: &Network) -> Result<CycleSummary, CycleError> {
        let started = Instant::now();
        let result = self.orchestrator.run_cycle(network).await;
        self.metrics.record_cycle(result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            error!(error = %e, "Measurement cycle failed");
        }
        result
    }

    /// Gate, then run a single cycle
    pub async fn run_once(&self) -> Result<CycleSummary, CycleError> {
        let network = self.prepare().await?;
        self.measure(&network).await
    }

    /// Run cycles on interval boundaries until `shutdown` resolves
    ///
    /// A failed cycle ends the loop with its error. Shutdown is observed
    /// while waiting for the migration block and between cycles.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), CycleError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        let network = tokio::select! {
            network = self.prepare() => network?,
            _ = &mut shutdown => {
                info!("Shutdown requested before monitoring started");
                return Ok(());
            }
        };

        let interval = Duration::from_millis(self.schedule.interval_ms);
        info!(interval_ms = self.schedule.interval_ms, "Starting measurement loop");

        loop {
            self.measure(&network).await?;

            let wait = duration_until_next_boundary(Utc::now(), interval);
            info!(sleep_ms = wait.as_millis() as u64, "Sleeping until next cycle");

            tokio::select! {
                _ = sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping measurement loop");
                    return Ok(());
                }
            }
        }
    }
}
