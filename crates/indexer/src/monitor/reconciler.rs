use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{CycleError, DirectorySnapshot, ReconcileReport};
use crate::celocli::{NodeCandidates, ValidatorDirectorySource};
use crate::persistence::{
    normalized_name, Network, NewValidator, NewValidatorGroup, Store, ValidatorIdentity,
};
use crate::rpc::ChainHeightSource;

/// Aligns the stored validator directory with the authoritative listing
pub struct DirectoryReconciler {
    directory: Arc<dyn ValidatorDirectorySource>,
    chain: Arc<dyn ChainHeightSource>,
    store: Arc<dyn Store>,
    nodes: NodeCandidates,
}

impl DirectoryReconciler {
    pub fn new(
        directory: Arc<dyn ValidatorDirectorySource>,
        chain: Arc<dyn ChainHeightSource>,
        store: Arc<dyn Store>,
        nodes: NodeCandidates,
    ) -> Self {
        Self {
            directory,
            chain,
            store,
            nodes,
        }
    }

    pub async fn reconcile(
        &self,
        network: &Network,
    ) -> Result<(DirectorySnapshot, ReconcileReport), CycleError> {
        let block_number = self.chain.current_block().await?;
        let mut report = ReconcileReport::default();

        let (groups, _) = self
            .nodes
            .try_each("validatorgroup:list", |node| async move {
                self.directory.validator_groups(&node).await
            })
            .await?;

        let stored_groups: HashMap<String, _> = self
            .store
            .validator_groups(network.id)
            .await?
            .into_iter()
            .map(|g| (g.address.clone(), g))
            .collect();

        let mut staged_groups = Vec::new();
        let mut seen = HashSet::new();
        for group in &groups {
            if !seen.insert(group.address.as_str()) {
                continue;
            }
            let name = normalized_name(group.name.as_deref(), &group.address);
            match stored_groups.get(&group.address) {
                None => staged_groups.push(NewValidatorGroup {
                    address: group.address.clone(),
                    name,
                }),
                Some(stored) => {
                    if normalized_name(stored.name.as_deref(), &stored.address) != name {
                        debug!(group = %group.address, name = %name, "Validator group renamed");
                        self.store.rename_validator_group(stored.id, &name).await?;
                        report.groups_renamed += 1;
                    }
                }
            }
        }

        if !staged_groups.is_empty() {
            report.groups_inserted = self
                .store
                .insert_validator_groups(network.id, &staged_groups)
                .await?;
        }

        let (validators, node) = self
            .nodes
            .try_each("election:current", |node| async move {
                self.directory.elected_validators(&node).await
            })
            .await?;

        let stored_validators: HashMap<String, _> = self
            .store
            .validators(network.id)
            .await?
            .into_iter()
            .map(|v| (v.address.clone(), v))
            .collect();

        let mut staged_validators = Vec::new();
        let mut seen = HashSet::new();
        for validator in &validators {
            if !seen.insert(validator.address.as_str()) {
                continue;
            }
            let Some(stored) = stored_validators.get(&validator.address) else {
                staged_validators.push(NewValidator {
                    address: validator.address.clone(),
                    affiliation: validator.affiliation.clone(),
                });
                continue;
            };

            if report.names_changed {
                continue;
            }
            let expected = normalized_name(validator.name.as_deref(), &validator.address);
            let recorded = self
                .store
                .validator_name_at_block(stored.id, block_number)
                .await?
                .map(|n| normalized_name(Some(&n.name), &validator.address));
            if recorded.as_deref() != Some(expected.as_str()) {
                debug!(validator = %validator.address, "Validator name history out of date");
                report.names_changed = true;
            }
        }

        if !staged_validators.is_empty() {
            report.validators_inserted = self
                .store
                .insert_validators(network.id, &staged_validators)
                .await?;
        }

        if !staged_groups.is_empty() || !staged_validators.is_empty() || report.names_changed {
            let identities: Vec<ValidatorIdentity> = validators
                .iter()
                .map(|v| ValidatorIdentity {
                    address: v.address.clone(),
                    name: v.name.clone(),
                    affiliation: v.affiliation.clone(),
                })
                .collect();
            let outcome = self
                .store
                .refresh_directory_history(network.id, block_number, &identities)
                .await?;
            report.history_refreshed = true;
            info!(
                block = block_number,
                names_appended = outcome.names_appended,
                affiliations_updated = outcome.affiliations_updated,
                "Refreshed validator name history"
            );
        }

        info!(
            block = block_number,
            node = %node,
            groups = groups.len(),
            elected = validators.len(),
            groups_inserted = report.groups_inserted,
            groups_renamed = report.groups_renamed,
            validators_inserted = report.validators_inserted,
            "Directory reconciled"
        );

        Ok((
            DirectorySnapshot {
                block_number,
                node,
                groups,
                validators,
            },
            report,
        ))
    }
}
