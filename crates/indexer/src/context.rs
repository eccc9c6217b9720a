//! Explicitly constructed service context
//!
//! Owns every long-lived handle the monitor needs. Opened once at startup
//! and closed on exit.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::celocli::{CeloCli, NodeCandidates, ValidatorDirectorySource};
use crate::config::IndexerConfig;
use crate::metrics::IndexerMetrics;
use crate::monitor::MetadataFetcher;
use crate::persistence::SqliteStore;
use crate::process::ProcessRunner;
use crate::rpc::{ChainHeightSource, JsonRpcChainHeight, JsonRpcClient};

pub struct IndexerContext {
    pub config: IndexerConfig,
    pub store: Arc<SqliteStore>,
    pub directory: Arc<dyn ValidatorDirectorySource>,
    pub chain: Arc<dyn ChainHeightSource>,
    pub rpc: JsonRpcClient,
    pub metadata: MetadataFetcher,
    pub nodes: NodeCandidates,
    pub metrics: IndexerMetrics,
}

impl IndexerContext {
    /// Connect the store and build the tool and network clients from `config`
    pub async fn open(config: IndexerConfig) -> Result<Self> {
        let store = SqliteStore::connect(&config.database)
            .await
            .context("Failed to open the indexer database")?;
        let metrics = IndexerMetrics::new(config.metrics.clone());

        let directory = Arc::new(CeloCli::new(
            &config.cli,
            ProcessRunner::new(),
            metrics.prometheus(),
        ));

        let nodes = node_candidates(&config);
        let rpc = JsonRpcClient::new(config.probe.json_rpc_timeout())?;
        let chain = Arc::new(JsonRpcChainHeight::new(rpc.clone(), nodes));

        Self::from_parts(config, Arc::new(store), directory, chain, rpc, metrics)
    }

    /// Assemble a context around an existing store, sources and probe client
    pub fn from_parts(
        config: IndexerConfig,
        store: Arc<SqliteStore>,
        directory: Arc<dyn ValidatorDirectorySource>,
        chain: Arc<dyn ChainHeightSource>,
        rpc: JsonRpcClient,
        metrics: IndexerMetrics,
    ) -> Result<Self> {
        let metadata = MetadataFetcher::new(&config.metadata)?;
        let nodes = node_candidates(&config);

        info!(
            network = %config.network.name,
            node = %nodes.primary(),
            fallback = ?nodes.fallback(),
            "Indexer context ready"
        );

        Ok(Self {
            config,
            store,
            directory,
            chain,
            rpc,
            metadata,
            nodes,
            metrics,
        })
    }

    pub async fn close(&self) {
        self.store.close().await;
        info!("Indexer context closed");
    }
}

fn node_candidates(config: &IndexerConfig) -> NodeCandidates {
    NodeCandidates::new(
        config.network.node_url.clone(),
        config.network.external_node_url.clone(),
    )
}
