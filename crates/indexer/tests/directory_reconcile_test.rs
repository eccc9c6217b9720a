//! Reconciliation writes observed through a counting store

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::error::PersistenceError;
use rpc_indexer::celocli::{
    CliToolError, ElectedValidator, ListedValidatorGroup, NodeCandidates,
    ValidatorDirectorySource,
};
use rpc_indexer::monitor::DirectoryReconciler;
use rpc_indexer::persistence::*;
use rpc_indexer::rpc::{ChainHeightSource, RpcError};

/// Delegates to a sqlite store and counts every mutating call
struct CountingStore {
    inner: SqliteStore,
    writes: AtomicU64,
}

impl CountingStore {
    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn get_or_insert_network(&self, name: &str) -> Result<Network, PersistenceError> {
        self.inner.get_or_insert_network(name).await
    }

    async fn validator_groups(
        &self,
        network_id: i64,
    ) -> Result<Vec<ValidatorGroup>, PersistenceError> {
        self.inner.validator_groups(network_id).await
    }

    async fn insert_validator_groups(
        &self,
        network_id: i64,
        groups: &[NewValidatorGroup],
    ) -> Result<u64, PersistenceError> {
        self.write();
        self.inner.insert_validator_groups(network_id, groups).await
    }

    async fn rename_validator_group(
        &self,
        group_id: i64,
        name: &str,
    ) -> Result<(), PersistenceError> {
        self.write();
        self.inner.rename_validator_group(group_id, name).await
    }

    async fn validators(&self, network_id: i64) -> Result<Vec<Validator>, PersistenceError> {
        self.inner.validators(network_id).await
    }

    async fn insert_validators(
        &self,
        network_id: i64,
        validators: &[NewValidator],
    ) -> Result<u64, PersistenceError> {
        self.write();
        self.inner.insert_validators(network_id, validators).await
    }

    async fn validators_by_addresses(
        &self,
        network_id: i64,
        addresses: &[String],
    ) -> Result<Vec<Validator>, PersistenceError> {
        self.inner.validators_by_addresses(network_id, addresses).await
    }

    async fn validator_name_at_block(
        &self,
        validator_id: i64,
        block: u64,
    ) -> Result<Option<ValidatorName>, PersistenceError> {
        self.inner.validator_name_at_block(validator_id, block).await
    }

    async fn refresh_directory_history(
        &self,
        network_id: i64,
        block: u64,
        validators: &[ValidatorIdentity],
    ) -> Result<RefreshOutcome, PersistenceError> {
        self.write();
        self.inner
            .refresh_directory_history(network_id, block, validators)
            .await
    }

    async fn latest_validator_rpc(
        &self,
        network_id: i64,
        validator_id: i64,
    ) -> Result<Option<ValidatorRpc>, PersistenceError> {
        self.inner.latest_validator_rpc(network_id, validator_id).await
    }

    async fn latest_rpc_url_for_address(
        &self,
        network_id: i64,
        address: &str,
    ) -> Result<Option<String>, PersistenceError> {
        self.inner.latest_rpc_url_for_address(network_id, address).await
    }

    async fn update_validator_rpc_url(
        &self,
        validator_id: i64,
        rpc_url: &str,
    ) -> Result<(), PersistenceError> {
        self.write();
        self.inner.update_validator_rpc_url(validator_id, rpc_url).await
    }

    async fn persist_cycle(&self, record: &CycleRecord) -> Result<CycleWrite, PersistenceError> {
        self.write();
        self.inner.persist_cycle(record).await
    }

    async fn measurements_for_header(
        &self,
        header_id: i64,
    ) -> Result<Vec<RpcMeasurement>, PersistenceError> {
        self.inner.measurements_for_header(header_id).await
    }

    async fn rpc_history(
        &self,
        network_id: i64,
        validator_id: i64,
    ) -> Result<Vec<ValidatorRpc>, PersistenceError> {
        self.inner.rpc_history(network_id, validator_id).await
    }

    async fn latest_header(
        &self,
        network_id: i64,
    ) -> Result<Option<RpcMeasurementHeader>, PersistenceError> {
        self.inner.latest_header(network_id).await
    }
}

struct StaticListing;

#[async_trait]
impl ValidatorDirectorySource for StaticListing {
    async fn elected_validators(&self, _node: &str) -> Result<Vec<ElectedValidator>, CliToolError> {
        Ok((1..=3)
            .map(|i| ElectedValidator {
                address: format!("0xV{i}"),
                name: (i != 3).then(|| format!("Validator {i}")),
                affiliation: Some(format!("0xG{}", i % 2)),
            })
            .collect())
    }

    async fn validator_groups(
        &self,
        _node: &str,
    ) -> Result<Vec<ListedValidatorGroup>, CliToolError> {
        Ok(vec![
            ListedValidatorGroup {
                address: "0xG0".to_string(),
                name: Some("Group Zero".to_string()),
            },
            ListedValidatorGroup {
                address: "0xG1".to_string(),
                name: None,
            },
        ])
    }

    async fn metadata_url(
        &self,
        _address: &str,
        _node: &str,
    ) -> Result<Option<String>, CliToolError> {
        Ok(None)
    }
}

struct Height(u64);

#[async_trait]
impl ChainHeightSource for Height {
    async fn current_block(&self) -> Result<u64, RpcError> {
        Ok(self.0)
    }
}

#[tokio::test]
async fn test_second_reconcile_with_unchanged_listing_writes_nothing() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = Arc::new(CountingStore {
        inner: SqliteStore::new(pool).await.unwrap(),
        writes: AtomicU64::new(0),
    });
    let network = store.get_or_insert_network("celo").await.unwrap();
    let nodes = NodeCandidates::new("http://node", None);

    let first = DirectoryReconciler::new(
        Arc::new(StaticListing),
        Arc::new(Height(1_000)),
        store.clone(),
        nodes.clone(),
    );
    let (_, report) = first.reconcile(&network).await.unwrap();
    assert_eq!(report.groups_inserted, 2);
    assert_eq!(report.validators_inserted, 3);
    assert!(report.history_refreshed);
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);

    let second = DirectoryReconciler::new(
        Arc::new(StaticListing),
        Arc::new(Height(1_020)),
        store.clone(),
        nodes,
    );
    let (snapshot, report) = second.reconcile(&network).await.unwrap();
    assert_eq!(snapshot.block_number, 1_020);
    assert!(!report.wrote_anything());
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);
}
