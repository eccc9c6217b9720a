//! Measurement cycle rows and RPC URL history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per measurement cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcMeasurementHeader {
    pub id: i64,
    pub network_id: i64,
    pub executed_at: DateTime<Utc>,
    pub measurement_id: Uuid,
}

/// One row per validator per cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcMeasurement {
    pub id: i64,
    pub rpc_measurement_header_id: i64,
    pub network_id: i64,
    pub validator_id: i64,
    pub up: bool,
    pub block_number: Option<u64>,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    /// `None` when the sync check produced no answer
    pub is_syncing: Option<bool>,
}

/// RPC URL assignment first observed at a measurement header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRpc {
    pub id: i64,
    pub validator_id: i64,
    pub network_id: i64,
    pub rpc_measurement_header_id: i64,
    pub rpc_url: String,
}

/// Measurement awaiting its header id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMeasurement {
    pub validator_id: i64,
    pub up: bool,
    pub block_number: Option<u64>,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub is_syncing: Option<bool>,
}

impl NewMeasurement {
    /// Placeholder for a validator with no endpoint to probe
    pub fn unreachable(validator_id: i64) -> Self {
        Self {
            validator_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcAssignment {
    pub validator_id: i64,
    pub rpc_url: String,
}

/// Everything written by the end-of-cycle transaction
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub network_id: i64,
    pub executed_at: DateTime<Utc>,
    pub measurement_id: Uuid,
    pub measurements: Vec<NewMeasurement>,
    /// Current URL of every validator that has one
    pub rpc_assignments: Vec<RpcAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleWrite {
    pub header_id: i64,
    pub measurements_written: u64,
    pub rpc_rows_appended: u64,
}
