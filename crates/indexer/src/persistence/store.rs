use async_trait::async_trait;

use common::error::PersistenceError;

use super::entities::*;

/// Persistence boundary of the measurement engine
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_or_insert_network(&self, name: &str) -> Result<Network, PersistenceError>;

    async fn validator_groups(&self, network_id: i64)
        -> Result<Vec<ValidatorGroup>, PersistenceError>;

    /// Bulk insert; groups whose address already exists are skipped
    async fn insert_validator_groups(
        &self,
        network_id: i64,
        groups: &[NewValidatorGroup],
    ) -> Result<u64, PersistenceError>;

    async fn rename_validator_group(&self, group_id: i64, name: &str)
        -> Result<(), PersistenceError>;

    async fn validators(&self, network_id: i64) -> Result<Vec<Validator>, PersistenceError>;

    /// Bulk insert; validators whose address already exists are skipped
    async fn insert_validators(
        &self,
        network_id: i64,
        validators: &[NewValidator],
    ) -> Result<u64, PersistenceError>;

    async fn validators_by_addresses(
        &self,
        network_id: i64,
        addresses: &[String],
    ) -> Result<Vec<Validator>, PersistenceError>;

    /// Latest recorded name with `block_number <= block`
    async fn validator_name_at_block(
        &self,
        validator_id: i64,
        block: u64,
    ) -> Result<Option<ValidatorName>, PersistenceError>;

    /// Append name history at `block` and align affiliations with the listing
    async fn refresh_directory_history(
        &self,
        network_id: i64,
        block: u64,
        validators: &[ValidatorIdentity],
    ) -> Result<RefreshOutcome, PersistenceError>;

    /// Most recent RPC history row by header id
    async fn latest_validator_rpc(
        &self,
        network_id: i64,
        validator_id: i64,
    ) -> Result<Option<ValidatorRpc>, PersistenceError>;

    async fn latest_rpc_url_for_address(
        &self,
        network_id: i64,
        address: &str,
    ) -> Result<Option<String>, PersistenceError>;

    async fn update_validator_rpc_url(
        &self,
        validator_id: i64,
        rpc_url: &str,
    ) -> Result<(), PersistenceError>;

    /// Header, measurements and RPC history in a single transaction
    async fn persist_cycle(&self, record: &CycleRecord) -> Result<CycleWrite, PersistenceError>;

    async fn measurements_for_header(
        &self,
        header_id: i64,
    ) -> Result<Vec<RpcMeasurement>, PersistenceError>;

    async fn rpc_history(
        &self,
        network_id: i64,
        validator_id: i64,
    ) -> Result<Vec<ValidatorRpc>, PersistenceError>;

    async fn latest_header(
        &self,
        network_id: i64,
    ) -> Result<Option<RpcMeasurementHeader>, PersistenceError>;
}
