//! Validator directory rows: networks, groups, validators and name history

use serde::{Deserialize, Serialize};

/// Monitored chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorGroup {
    pub id: i64,
    pub network_id: i64,
    pub address: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub id: i64,
    pub network_id: i64,
    pub address: String,
    /// Address of the group the validator is affiliated with
    pub affiliation: Option<String>,
    /// Most recently resolved RPC URL
    pub rpc_url: Option<String>,
}

/// Display name of a validator as of a block height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorName {
    pub id: i64,
    pub validator_id: i64,
    pub network_id: i64,
    pub block_number: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewValidatorGroup {
    pub address: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewValidator {
    pub address: String,
    pub affiliation: Option<String>,
}

/// Authoritative identity of a validator used by the history refresh pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorIdentity {
    pub address: String,
    pub name: Option<String>,
    pub affiliation: Option<String>,
}

/// Writes performed by a history refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub names_appended: u64,
    pub affiliations_updated: u64,
}

/// Display name with empty or absent values replaced by the owner's address
pub fn normalized_name(name: Option<&str>, address: &str) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => address.to_string(),
    }
}
