//! # Indexer Configuration
//!
//! Layered configuration management for the RPC indexer. Every timing knob
//! is an integer number of milliseconds so it can be overridden from the
//! environment, e.g. `RPC_INDEXER_CLI__TIMEOUT_MS=30000`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use common::config::{loader, ConfigValidation, DatabaseConfig, LoggingConfig, MetricsConfig};
use common::error::ConfigurationError;

use crate::process::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,

    /// Monitored network and the nodes used to query it
    pub network: NetworkConfig,

    /// External validator-listing tool invocation
    pub cli: CliToolConfig,

    /// Metadata document fetches
    pub metadata: MetadataConfig,

    /// JSON-RPC endpoint probes
    pub probe: ProbeConfig,

    /// Cycle scheduling and the startup gate
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name recorded in the `networks` table
    pub name: String,
    /// Primary node queried by the tool and for chain height
    pub node_url: String,
    /// Fallback node used once when the primary fails
    pub external_node_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "celo".to_string(),
            node_url: "http://localhost:8545".to_string(),
            external_node_url: Some("https://forno.celo.org".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliToolConfig {
    /// Program (and fixed leading arguments) of the validator-listing tool
    pub program: String,
    /// Hard timeout per attempt
    pub timeout_ms: u64,
    /// Retries after the first attempt for listing commands
    pub max_retries: u32,
    /// Retries after the first attempt for metadata pointer lookups
    #[serde(default = "default_metadata_max_retries")]
    pub metadata_max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_metadata_max_retries() -> u32 {
    1
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for CliToolConfig {
    fn default() -> Self {
        Self {
            program: "npx celocli".to_string(),
            timeout_ms: 20_000,
            max_retries: 3,
            metadata_max_retries: default_metadata_max_retries(),
            base_delay_ms: 2_000,
            max_delay_ms: 20_000,
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl CliToolConfig {
    /// Retry policy for election and group listings
    pub fn listing_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }

    /// Retry policy for per-validator metadata pointer lookups
    pub fn metadata_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.metadata_max_retries,
            ..self.listing_policy()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub fetch_timeout_ms: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 15_000,
            max_redirects: 5,
            user_agent: format!("rpc-indexer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl MetadataConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Timeout applied to each JSON-RPC call independently
    pub json_rpc_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            json_rpc_timeout_ms: 5_000,
        }
    }
}

impl ProbeConfig {
    pub fn json_rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.json_rpc_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cycle interval; cycles start on multiples of it
    pub interval_ms: u64,
    /// Chain height that must be reached before monitoring starts
    pub migration_block: u64,
    /// Poll interval while waiting for the migration block
    pub migration_poll_ms: u64,
    /// Concurrency width for resolution and probing
    pub batch_size: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300_000,
            migration_block: 0,
            migration_poll_ms: 5_000,
            batch_size: 10,
        }
    }
}

impl ScheduleConfig {
    pub fn migration_poll_interval(&self) -> Duration {
        Duration::from_millis(self.migration_poll_ms)
    }
}

impl ConfigValidation for IndexerConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        self.database.validate()?;
        self.logging.validate()?;

        if self.schedule.migration_block == 0 {
            return Err(ConfigurationError::MissingRequired {
                key: "schedule.migration_block".to_string(),
            });
        }

        if self.network.name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "network.name",
                &self.network.name,
                "Network name cannot be empty",
            ));
        }

        if self.network.node_url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "network.node_url",
                &self.network.node_url,
                "Node URL cannot be empty",
            ));
        }

        if self.cli.program.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "cli.program",
                &self.cli.program,
                "Tool program cannot be empty",
            ));
        }

        let positive_ms = [
            ("schedule.interval_ms", self.schedule.interval_ms),
            ("schedule.migration_poll_ms", self.schedule.migration_poll_ms),
            ("cli.timeout_ms", self.cli.timeout_ms),
            ("metadata.fetch_timeout_ms", self.metadata.fetch_timeout_ms),
            ("probe.json_rpc_timeout_ms", self.probe.json_rpc_timeout_ms),
        ];
        for (key, value) in positive_ms {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    key,
                    value,
                    "Must be greater than 0",
                ));
            }
        }

        if self.schedule.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "schedule.batch_size",
                self.schedule.batch_size,
                "Must allow at least 1 concurrent task",
            ));
        }

        if self.cli.backoff_multiplier.is_nan() || self.cli.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "cli.backoff_multiplier",
                self.cli.backoff_multiplier,
                "Backoff multiplier must be at least 1",
            ));
        }

        Ok(())
    }

    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match &self.network.external_node_url {
            None => warnings.push(
                "No external node configured - primary node failures will not be retried"
                    .to_string(),
            ),
            Some(external) if external.trim() == self.network.node_url.trim() => warnings.push(
                "External node equals the primary node - fallback is ineffective".to_string(),
            ),
            Some(_) => {}
        }

        if self.cli.timeout_ms > self.schedule.interval_ms {
            warnings.push("Tool timeout exceeds the cycle interval".to_string());
        }

        warnings
    }
}

impl IndexerConfig {
    /// Load configuration using common loader with environment prefix
    pub fn load() -> Result<Self> {
        Ok(loader::load_config::<Self>()?)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        Ok(loader::load_from_file::<Self>(path)?)
    }
}
