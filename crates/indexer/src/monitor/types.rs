use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use common::error::{IndexerError, PersistenceError};

use crate::celocli::{CliToolError, ElectedValidator, ListedValidatorGroup};
use crate::persistence::NewMeasurement;
use crate::rpc::RpcError;

/// Stage of the resolution chain that produced an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    /// `rpcUrl` of the document behind the on-chain metadata pointer
    Metadata,
    /// Latest URL recorded in the RPC history
    Stored,
}

impl ResolutionStage {
    pub fn as_label(&self) -> &'static str {
        match self {
            ResolutionStage::Metadata => "metadata",
            ResolutionStage::Stored => "stored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub url: String,
    pub stage: ResolutionStage,
}

/// Result of probing one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub up: bool,
    pub block_number: Option<u64>,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub is_syncing: Option<bool>,
}

impl ProbeResult {
    pub fn into_measurement(self, validator_id: i64) -> NewMeasurement {
        NewMeasurement {
            validator_id,
            up: self.up,
            block_number: self.block_number,
            status_code: self.status_code,
            response_time_ms: self.response_time_ms,
            is_syncing: self.is_syncing,
        }
    }
}

/// Authoritative listing observed during reconciliation
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    pub block_number: u64,
    /// Node that served the elected validator listing
    pub node: String,
    pub groups: Vec<ListedValidatorGroup>,
    pub validators: Vec<ElectedValidator>,
}

impl DirectorySnapshot {
    pub fn validator_addresses(&self) -> Vec<String> {
        self.validators.iter().map(|v| v.address.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub groups_inserted: u64,
    pub groups_renamed: u64,
    pub validators_inserted: u64,
    pub names_changed: bool,
    pub history_refreshed: bool,
}

impl ReconcileReport {
    pub fn wrote_anything(&self) -> bool {
        self.groups_inserted > 0
            || self.groups_renamed > 0
            || self.validators_inserted > 0
            || self.history_refreshed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub measurement_id: Uuid,
    pub header_id: i64,
    pub elected: usize,
    pub reachable: usize,
    pub unreachable: usize,
    /// Validators measured without an endpoint
    pub unresolved: usize,
    pub rpc_rows_appended: u64,
    pub duration: Duration,
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Validator tool failed: {0}")]
    Tool(#[from] CliToolError),

    #[error("Chain height unavailable: {0}")]
    Chain(#[from] RpcError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl IndexerError for CycleError {}
