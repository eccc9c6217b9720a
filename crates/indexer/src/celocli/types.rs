use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::error::IndexerError;

use crate::process::ProcessError;

/// Entry of `election:current --output json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectedValidator {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Address of the validator group the validator belongs to
    #[serde(default)]
    pub affiliation: Option<String>,
}

/// Entry of `validatorgroup:list --output json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedValidatorGroup {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliToolError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("No closing bracket found in tool output")]
    MissingJsonArray,

    #[error("Failed to parse tool output as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexerError for CliToolError {}
