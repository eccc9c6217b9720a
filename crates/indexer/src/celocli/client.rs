use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    parse_json_array, parse_metadata_url, CliToolError, ElectedValidator, ListedValidatorGroup,
};
use crate::config::CliToolConfig;
use crate::metrics::IndexerPrometheusMetrics;
use crate::process::{ProcessRunner, RetryPolicy};
use crate::util::snippet;

const ELECTION_CURRENT: &str = "election:current";
const VALIDATOR_GROUP_LIST: &str = "validatorgroup:list";
const ACCOUNT_SHOW: &str = "account:show";

/// Authoritative validator directory queried against a specific node
#[async_trait]
pub trait ValidatorDirectorySource: Send + Sync {
    async fn elected_validators(&self, node: &str) -> Result<Vec<ElectedValidator>, CliToolError>;

    async fn validator_groups(&self, node: &str)
        -> Result<Vec<ListedValidatorGroup>, CliToolError>;

    /// On-chain metadata pointer of a validator account, if registered
    async fn metadata_url(&self, address: &str, node: &str)
        -> Result<Option<String>, CliToolError>;
}

/// [`ValidatorDirectorySource`] backed by the `celocli` command-line tool
pub struct CeloCli {
    runner: ProcessRunner,
    program: String,
    listing_policy: RetryPolicy,
    metadata_policy: RetryPolicy,
    metrics: Arc<IndexerPrometheusMetrics>,
}

impl CeloCli {
    pub fn new(
        config: &CliToolConfig,
        runner: ProcessRunner,
        metrics: Arc<IndexerPrometheusMetrics>,
    ) -> Self {
        Self {
            runner,
            program: config.program.trim().to_string(),
            listing_policy: config.listing_policy(),
            metadata_policy: config.metadata_policy(),
            metrics,
        }
    }

    /// Full shell command for a tool subcommand against `node`
    pub fn command_line(&self, subcommand: &str, args: &str, node: &str) -> String {
        let mut command = format!("NO_SYNCCHECK=1 {} {}", self.program, subcommand);
        if !args.is_empty() {
            command.push(' ');
            command.push_str(args);
        }
        command.push_str(" --node ");
        command.push_str(node);
        command
    }

    async fn invoke(
        &self,
        subcommand: &'static str,
        args: &str,
        node: &str,
        policy: &RetryPolicy,
    ) -> Result<String, CliToolError> {
        let command = self.command_line(subcommand, args, node);
        debug!(command = %command, "Invoking validator tool");

        let result = self.runner.run(&command, policy).await;
        self.metrics.record_tool_invocation(subcommand, result.is_ok());

        Ok(result?.stdout)
    }
}

#[async_trait]
impl ValidatorDirectorySource for CeloCli {
    async fn elected_validators(&self, node: &str) -> Result<Vec<ElectedValidator>, CliToolError> {
        let stdout = self
            .invoke(ELECTION_CURRENT, "--output json", node, &self.listing_policy)
            .await?;
        let validators: Vec<ElectedValidator> = parse_json_array(&stdout).map_err(|e| {
            warn!(node = %node, output = %snippet(&stdout), "Unparseable elected validator listing");
            e
        })?;
        info!(node = %node, count = validators.len(), "Fetched elected validators");
        Ok(validators)
    }

    async fn validator_groups(
        &self,
        node: &str,
    ) -> Result<Vec<ListedValidatorGroup>, CliToolError> {
        let stdout = self
            .invoke(VALIDATOR_GROUP_LIST, "--output json", node, &self.listing_policy)
            .await?;
        let groups: Vec<ListedValidatorGroup> = parse_json_array(&stdout).map_err(|e| {
            warn!(node = %node, output = %snippet(&stdout), "Unparseable validator group listing");
            e
        })?;
        info!(node = %node, count = groups.len(), "Fetched validator groups");
        Ok(groups)
    }

    async fn metadata_url(
        &self,
        address: &str,
        node: &str,
    ) -> Result<Option<String>, CliToolError> {
        let stdout = self
            .invoke(ACCOUNT_SHOW, address, node, &self.metadata_policy)
            .await?;
        Ok(parse_metadata_url(&stdout))
    }
}
