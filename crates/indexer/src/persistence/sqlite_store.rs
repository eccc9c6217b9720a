use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use common::config::DatabaseConfig;
use common::error::PersistenceError;
use common::persistence::establish_sqlite_pool;

use super::entities::*;
use super::store::Store;

/// Upper bound on bound parameters in a single sqlite statement
const MAX_BIND_PARAMS: usize = 999;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS networks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        network_name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS validator_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        network_id INTEGER NOT NULL,
        address TEXT NOT NULL,
        name TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (network_id, address),
        FOREIGN KEY (network_id) REFERENCES networks (id)
    );

    CREATE TABLE IF NOT EXISTS validators (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        network_id INTEGER NOT NULL,
        address TEXT NOT NULL,
        affiliation TEXT,
        rpc_url TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (network_id, address),
        FOREIGN KEY (network_id) REFERENCES networks (id)
    );

    CREATE TABLE IF NOT EXISTS validator_names (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        validator_id INTEGER NOT NULL,
        network_id INTEGER NOT NULL,
        block_number INTEGER NOT NULL,
        validator_name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (validator_id) REFERENCES validators (id)
    );

    CREATE INDEX IF NOT EXISTS idx_validator_names_block
        ON validator_names (validator_id, block_number);

    CREATE TABLE IF NOT EXISTS rpc_measurement_headers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        network_id INTEGER NOT NULL,
        executed_at TEXT NOT NULL,
        measurement_id TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        FOREIGN KEY (network_id) REFERENCES networks (id)
    );

    CREATE TABLE IF NOT EXISTS rpc_measurements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        rpc_measurement_header_id INTEGER NOT NULL,
        network_id INTEGER NOT NULL,
        validator_id INTEGER NOT NULL,
        up INTEGER NOT NULL,
        block_number INTEGER,
        status_code INTEGER,
        response_time_ms INTEGER,
        is_syncing INTEGER,
        UNIQUE (rpc_measurement_header_id, validator_id),
        FOREIGN KEY (rpc_measurement_header_id) REFERENCES rpc_measurement_headers (id),
        FOREIGN KEY (validator_id) REFERENCES validators (id)
    );

    CREATE TABLE IF NOT EXISTS validator_rpcs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        validator_id INTEGER NOT NULL,
        network_id INTEGER NOT NULL,
        rpc_measurement_header_id INTEGER NOT NULL,
        rpc_url TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (validator_id) REFERENCES validators (id),
        FOREIGN KEY (rpc_measurement_header_id) REFERENCES rpc_measurement_headers (id)
    );

    CREATE INDEX IF NOT EXISTS idx_validator_rpcs_latest
        ON validator_rpcs (validator_id, network_id, rpc_measurement_header_id);
"#;

const VALIDATOR_COLUMNS: &str = "id, network_id, address, affiliation, rpc_url";

const LATEST_RPC_URL: &str = r#"
    SELECT rpc_url FROM validator_rpcs
    WHERE validator_id = ? AND network_id = ?
    ORDER BY rpc_measurement_header_id DESC, id DESC
    LIMIT 1
"#;

const NAME_AT_BLOCK: &str = r#"
    SELECT id, validator_id, network_id, block_number, validator_name
    FROM validator_names
    WHERE validator_id = ? AND block_number <= ?
    ORDER BY block_number DESC, id DESC
    LIMIT 1
"#;

/// sqlite-backed [`Store`]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the configured database and bootstrap the schema
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        let pool = establish_sqlite_pool(config).await?;
        Self::new(pool).await
    }

    pub async fn new(pool: SqlitePool) -> Result<Self, PersistenceError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }

    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::MigrationFailed {
                details: e.to_string(),
            })?;
        debug!("Schema bootstrap complete");
        Ok(())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn row_to_validator(row: &SqliteRow) -> Validator {
    Validator {
        id: row.get("id"),
        network_id: row.get("network_id"),
        address: row.get("address"),
        affiliation: row.get("affiliation"),
        rpc_url: row.get("rpc_url"),
    }
}

fn row_to_validator_name(row: &SqliteRow) -> ValidatorName {
    let block_number: i64 = row.get("block_number");
    ValidatorName {
        id: row.get("id"),
        validator_id: row.get("validator_id"),
        network_id: row.get("network_id"),
        block_number: block_number as u64,
        name: row.get("validator_name"),
    }
}

fn row_to_validator_rpc(row: &SqliteRow) -> ValidatorRpc {
    ValidatorRpc {
        id: row.get("id"),
        validator_id: row.get("validator_id"),
        network_id: row.get("network_id"),
        rpc_measurement_header_id: row.get("rpc_measurement_header_id"),
        rpc_url: row.get("rpc_url"),
    }
}

fn row_to_measurement(row: &SqliteRow) -> RpcMeasurement {
    let up: i64 = row.get("up");
    let block_number: Option<i64> = row.get("block_number");
    let status_code: Option<i64> = row.get("status_code");
    let response_time_ms: Option<i64> = row.get("response_time_ms");
    let is_syncing: Option<i64> = row.get("is_syncing");

    RpcMeasurement {
        id: row.get("id"),
        rpc_measurement_header_id: row.get("rpc_measurement_header_id"),
        network_id: row.get("network_id"),
        validator_id: row.get("validator_id"),
        up: up != 0,
        block_number: block_number.map(|v| v as u64),
        status_code: status_code.map(|v| v as u16),
        response_time_ms: response_time_ms.map(|v| v as u64),
        is_syncing: is_syncing.map(|v| v != 0),
    }
}

fn row_to_header(row: &SqliteRow) -> Result<RpcMeasurementHeader, PersistenceError> {
    let executed_at: String = row.get("executed_at");
    let measurement_id: String = row.get("measurement_id");

    Ok(RpcMeasurementHeader {
        id: row.get("id"),
        network_id: row.get("network_id"),
        executed_at: DateTime::parse_from_rfc3339(&executed_at)
            .map_err(|e| PersistenceError::DeserializationFailed {
                details: format!("executed_at {executed_at}: {e}"),
            })?
            .with_timezone(&Utc),
        measurement_id: Uuid::parse_str(&measurement_id).map_err(|e| {
            PersistenceError::DeserializationFailed {
                details: format!("measurement_id {measurement_id}: {e}"),
            }
        })?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_or_insert_network(&self, name: &str) -> Result<Network, PersistenceError> {
        sqlx::query(
            "INSERT INTO networks (network_name, created_at) VALUES (?, ?) ON CONFLICT (network_name) DO NOTHING",
        )
        .bind(name)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("insert network", e))?;

        let row = sqlx::query("SELECT id, network_name FROM networks WHERE network_name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::query("select network", e))?;

        Ok(Network {
            id: row.get("id"),
            name: row.get("network_name"),
        })
    }

    async fn validator_groups(
        &self,
        network_id: i64,
    ) -> Result<Vec<ValidatorGroup>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, network_id, address, name FROM validator_groups WHERE network_id = ? ORDER BY id",
        )
        .bind(network_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("select validator groups", e))?;

        Ok(rows
            .iter()
            .map(|row| ValidatorGroup {
                id: row.get("id"),
                network_id: row.get("network_id"),
                address: row.get("address"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn insert_validator_groups(
        &self,
        network_id: i64,
        groups: &[NewValidatorGroup],
    ) -> Result<u64, PersistenceError> {
        let now = now_rfc3339();
        let mut inserted = 0;

        for chunk in groups.chunks(MAX_BIND_PARAMS / 5) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO validator_groups (network_id, address, name, created_at, updated_at) ",
            );
            builder.push_values(chunk, |mut b, group| {
                b.push_bind(network_id)
                    .push_bind(group.address.clone())
                    .push_bind(group.name.clone())
                    .push_bind(now.clone())
                    .push_bind(now.clone());
            });
            builder.push(" ON CONFLICT (network_id, address) DO NOTHING");

            let result = builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::query("insert validator groups", e))?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn rename_validator_group(
        &self,
        group_id: i64,
        name: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE validator_groups SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(now_rfc3339())
            .bind(group_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::query("rename validator group", e))?;
        Ok(())
    }

    async fn validators(&self, network_id: i64) -> Result<Vec<Validator>, PersistenceError> {
        let rows = sqlx::query(&format!(
            "SELECT {VALIDATOR_COLUMNS} FROM validators WHERE network_id = ? ORDER BY id"
        ))
        .bind(network_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("select validators", e))?;

        Ok(rows.iter().map(row_to_validator).collect())
    }

    async fn insert_validators(
        &self,
        network_id: i64,
        validators: &[NewValidator],
    ) -> Result<u64, PersistenceError> {
        let now = now_rfc3339();
        let mut inserted = 0;

        for chunk in validators.chunks(MAX_BIND_PARAMS / 5) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO validators (network_id, address, affiliation, created_at, updated_at) ",
            );
            builder.push_values(chunk, |mut b, validator| {
                b.push_bind(network_id)
                    .push_bind(validator.address.clone())
                    .push_bind(validator.affiliation.clone())
                    .push_bind(now.clone())
                    .push_bind(now.clone());
            });
            builder.push(" ON CONFLICT (network_id, address) DO NOTHING");

            let result = builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::query("insert validators", e))?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn validators_by_addresses(
        &self,
        network_id: i64,
        addresses: &[String],
    ) -> Result<Vec<Validator>, PersistenceError> {
        let mut validators = Vec::with_capacity(addresses.len());

        for chunk in addresses.chunks(MAX_BIND_PARAMS - 1) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {VALIDATOR_COLUMNS} FROM validators WHERE network_id = "
            ));
            builder.push_bind(network_id);
            builder.push(" AND address IN (");
            let mut separated = builder.separated(", ");
            for address in chunk {
                separated.push_bind(address.clone());
            }
            separated.push_unseparated(") ORDER BY id");

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| PersistenceError::query("select validators by address", e))?;
            validators.extend(rows.iter().map(row_to_validator));
        }

        Ok(validators)
    }

    async fn validator_name_at_block(
        &self,
        validator_id: i64,
        block: u64,
    ) -> Result<Option<ValidatorName>, PersistenceError> {
        let row = sqlx::query(NAME_AT_BLOCK)
            .bind(validator_id)
            .bind(block as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::query("select validator name at block", e))?;

        Ok(row.as_ref().map(row_to_validator_name))
    }

    async fn refresh_directory_history(
        &self,
        network_id: i64,
        block: u64,
        validators: &[ValidatorIdentity],
    ) -> Result<RefreshOutcome, PersistenceError> {
        let now = now_rfc3339();
        let mut outcome = RefreshOutcome::default();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::query("begin directory refresh", e))?;

        for identity in validators {
            let row = sqlx::query(
                "SELECT id, affiliation FROM validators WHERE network_id = ? AND address = ?",
            )
            .bind(network_id)
            .bind(&identity.address)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| PersistenceError::query("select validator for refresh", e))?;

            let Some(row) = row else {
                continue;
            };
            let validator_id: i64 = row.get("id");
            let affiliation: Option<String> = row.get("affiliation");

            let name = normalized_name(identity.name.as_deref(), &identity.address);
            let recorded = sqlx::query(NAME_AT_BLOCK)
                .bind(validator_id)
                .bind(block as i64)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| PersistenceError::query("select validator name at block", e))?
                .map(|row| row_to_validator_name(&row).name);

            let recorded = recorded.map(|n| normalized_name(Some(&n), &identity.address));
            if recorded.as_deref() != Some(name.as_str()) {
                sqlx::query(
                    "INSERT INTO validator_names (validator_id, network_id, block_number, validator_name, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(validator_id)
                .bind(network_id)
                .bind(block as i64)
                .bind(&name)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(|e| PersistenceError::query("insert validator name", e))?;
                outcome.names_appended += 1;
            }

            if affiliation != identity.affiliation {
                sqlx::query("UPDATE validators SET affiliation = ?, updated_at = ? WHERE id = ?")
                    .bind(&identity.affiliation)
                    .bind(&now)
                    .bind(validator_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| PersistenceError::query("update validator affiliation", e))?;
                outcome.affiliations_updated += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| PersistenceError::query("commit directory refresh", e))?;

        Ok(outcome)
    }

    async fn latest_validator_rpc(
        &self,
        network_id: i64,
        validator_id: i64,
    ) -> Result<Option<ValidatorRpc>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT id, validator_id, network_id, rpc_measurement_header_id, rpc_url
            FROM validator_rpcs
            WHERE validator_id = ? AND network_id = ?
            ORDER BY rpc_measurement_header_id DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(validator_id)
        .bind(network_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("select latest validator rpc", e))?;

        Ok(row.as_ref().map(row_to_validator_rpc))
    }

    async fn latest_rpc_url_for_address(
        &self,
        network_id: i64,
        address: &str,
    ) -> Result<Option<String>, PersistenceError> {
        let url: Option<String> = sqlx::query_scalar(
            r#"
            SELECT r.rpc_url
            FROM validator_rpcs r
            JOIN validators v ON v.id = r.validator_id
            WHERE v.network_id = ? AND v.address = ? AND r.network_id = v.network_id
            ORDER BY r.rpc_measurement_header_id DESC, r.id DESC
            LIMIT 1
            "#,
        )
        .bind(network_id)
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("select latest rpc url", e))?;

        Ok(url.filter(|u| !u.trim().is_empty()))
    }

    async fn update_validator_rpc_url(
        &self,
        validator_id: i64,
        rpc_url: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE validators SET rpc_url = ?, updated_at = ? WHERE id = ?")
            .bind(rpc_url)
            .bind(now_rfc3339())
            .bind(validator_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::query("update validator rpc url", e))?;
        Ok(())
    }

    async fn persist_cycle(&self, record: &CycleRecord) -> Result<CycleWrite, PersistenceError> {
        let now = now_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::query("begin cycle", e))?;

        let header = sqlx::query(
            "INSERT INTO rpc_measurement_headers (network_id, executed_at, measurement_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(record.network_id)
        .bind(record.executed_at.to_rfc3339())
        .bind(record.measurement_id.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::query("insert measurement header", e))?;
        let header_id = header.last_insert_rowid();

        let mut measurements_written = 0;
        for chunk in record.measurements.chunks(MAX_BIND_PARAMS / 8) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO rpc_measurements (rpc_measurement_header_id, network_id, validator_id, up, block_number, status_code, response_time_ms, is_syncing) ",
            );
            builder.push_values(chunk, |mut b, m| {
                b.push_bind(header_id)
                    .push_bind(record.network_id)
                    .push_bind(m.validator_id)
                    .push_bind(i64::from(m.up))
                    .push_bind(m.block_number.map(|v| v as i64))
                    .push_bind(m.status_code.map(i64::from))
                    .push_bind(m.response_time_ms.map(|v| v as i64))
                    .push_bind(m.is_syncing.map(i64::from));
            });

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| PersistenceError::query("insert measurements", e))?;
            measurements_written += result.rows_affected();
        }

        let mut rpc_rows_appended = 0;
        for assignment in &record.rpc_assignments {
            let latest: Option<String> = sqlx::query_scalar(LATEST_RPC_URL)
                .bind(assignment.validator_id)
                .bind(record.network_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| PersistenceError::query("select latest rpc url", e))?;

            if latest.as_deref() == Some(assignment.rpc_url.as_str()) {
                continue;
            }

            debug!(
                validator_id = assignment.validator_id,
                previous = ?latest,
                rpc_url = %assignment.rpc_url,
                "Recording RPC URL change"
            );
            sqlx::query(
                "INSERT INTO validator_rpcs (validator_id, network_id, rpc_measurement_header_id, rpc_url, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(assignment.validator_id)
            .bind(record.network_id)
            .bind(header_id)
            .bind(&assignment.rpc_url)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::query("insert validator rpc", e))?;
            rpc_rows_appended += 1;
        }

        tx.commit()
            .await
            .map_err(|e| PersistenceError::query("commit cycle", e))?;

        Ok(CycleWrite {
            header_id,
            measurements_written,
            rpc_rows_appended,
        })
    }

    async fn measurements_for_header(
        &self,
        header_id: i64,
    ) -> Result<Vec<RpcMeasurement>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, rpc_measurement_header_id, network_id, validator_id, up,
                   block_number, status_code, response_time_ms, is_syncing
            FROM rpc_measurements
            WHERE rpc_measurement_header_id = ?
            ORDER BY validator_id
            "#,
        )
        .bind(header_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("select measurements", e))?;

        Ok(rows.iter().map(row_to_measurement).collect())
    }

    async fn rpc_history(
        &self,
        network_id: i64,
        validator_id: i64,
    ) -> Result<Vec<ValidatorRpc>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, validator_id, network_id, rpc_measurement_header_id, rpc_url
            FROM validator_rpcs
            WHERE validator_id = ? AND network_id = ?
            ORDER BY rpc_measurement_header_id, id
            "#,
        )
        .bind(validator_id)
        .bind(network_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("select rpc history", e))?;

        Ok(rows.iter().map(row_to_validator_rpc).collect())
    }

    async fn latest_header(
        &self,
        network_id: i64,
    ) -> Result<Option<RpcMeasurementHeader>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT id, network_id, executed_at, measurement_id
            FROM rpc_measurement_headers
            WHERE network_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(network_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::query("select latest header", e))?;

        row.as_ref().map(row_to_header).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::new(pool).await.unwrap()
    }

    async fn seeded(store: &SqliteStore) -> (Network, Vec<Validator>) {
        let network = store.get_or_insert_network("celo").await.unwrap();
        store
            .insert_validators(
                network.id,
                &[
                    NewValidator {
                        address: "0xV1".to_string(),
                        affiliation: Some("0xG1".to_string()),
                    },
                    NewValidator {
                        address: "0xV2".to_string(),
                        affiliation: None,
                    },
                ],
            )
            .await
            .unwrap();
        let validators = store.validators(network.id).await.unwrap();
        (network, validators)
    }

    fn record(network_id: i64, measurements: Vec<NewMeasurement>, urls: &[(i64, &str)]) -> CycleRecord {
        CycleRecord {
            network_id,
            executed_at: Utc::now(),
            measurement_id: Uuid::new_v4(),
            measurements,
            rpc_assignments: urls
                .iter()
                .map(|(validator_id, url)| RpcAssignment {
                    validator_id: *validator_id,
                    rpc_url: url.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_schema_bootstrap_is_idempotent() {
        let store = memory_store().await;
        store.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_or_insert_network_reuses_row() {
        let store = memory_store().await;
        let first = store.get_or_insert_network("celo").await.unwrap();
        let second = store.get_or_insert_network("celo").await.unwrap();
        let other = store.get_or_insert_network("celo-sepolia").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_group_insert_skips_existing_addresses() {
        let store = memory_store().await;
        let network = store.get_or_insert_network("celo").await.unwrap();
        let groups = vec![
            NewValidatorGroup {
                address: "0xG1".to_string(),
                name: "Group One".to_string(),
            },
            NewValidatorGroup {
                address: "0xG2".to_string(),
                name: "0xG2".to_string(),
            },
        ];

        assert_eq!(store.insert_validator_groups(network.id, &groups).await.unwrap(), 2);
        assert_eq!(store.insert_validator_groups(network.id, &groups).await.unwrap(), 0);

        let stored = store.validator_groups(network.id).await.unwrap();
        assert_eq!(stored.len(), 2);

        store.rename_validator_group(stored[0].id, "Renamed").await.unwrap();
        let stored = store.validator_groups(network.id).await.unwrap();
        assert_eq!(stored[0].name.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn test_validators_by_addresses() {
        let store = memory_store().await;
        let (network, _) = seeded(&store).await;

        let found = store
            .validators_by_addresses(network.id, &["0xV2".to_string(), "0xMISSING".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].address, "0xV2");

        let none = store.validators_by_addresses(network.id, &[]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_appends_only_changed_names() {
        let store = memory_store().await;
        let (network, validators) = seeded(&store).await;
        let listing = vec![
            ValidatorIdentity {
                address: "0xV1".to_string(),
                name: Some("Alpha".to_string()),
                affiliation: Some("0xG1".to_string()),
            },
            ValidatorIdentity {
                address: "0xV2".to_string(),
                name: Some(String::new()),
                affiliation: Some("0xG2".to_string()),
            },
        ];

        let first = store
            .refresh_directory_history(network.id, 100, &listing)
            .await
            .unwrap();
        assert_eq!(first.names_appended, 2);
        assert_eq!(first.affiliations_updated, 1);

        let again = store
            .refresh_directory_history(network.id, 150, &listing)
            .await
            .unwrap();
        assert_eq!(again, RefreshOutcome::default());

        let name = store
            .validator_name_at_block(validators[1].id, 150)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name.name, "0xV2");
        assert_eq!(name.block_number, 100);

        assert!(store
            .validator_name_at_block(validators[0].id, 99)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_name_at_block_picks_latest_not_after_block() {
        let store = memory_store().await;
        let (network, validators) = seeded(&store).await;
        let v1 = &validators[0];

        for (block, name) in [(10, "Old"), (20, "New")] {
            store
                .refresh_directory_history(
                    network.id,
                    block,
                    &[ValidatorIdentity {
                        address: v1.address.clone(),
                        name: Some(name.to_string()),
                        affiliation: v1.affiliation.clone(),
                    }],
                )
                .await
                .unwrap();
        }

        let at_15 = store.validator_name_at_block(v1.id, 15).await.unwrap().unwrap();
        let at_25 = store.validator_name_at_block(v1.id, 25).await.unwrap().unwrap();
        assert_eq!(at_15.name, "Old");
        assert_eq!(at_25.name, "New");
    }

    #[tokio::test]
    async fn test_persist_cycle_writes_header_and_measurements() {
        let store = memory_store().await;
        let (network, validators) = seeded(&store).await;

        let measurements = vec![
            NewMeasurement {
                validator_id: validators[0].id,
                up: true,
                block_number: Some(31_000_000),
                status_code: Some(200),
                response_time_ms: Some(87),
                is_syncing: Some(false),
            },
            NewMeasurement::unreachable(validators[1].id),
        ];
        let cycle = record(network.id, measurements, &[(validators[0].id, "https://rpc.v1")]);

        let write = store.persist_cycle(&cycle).await.unwrap();
        assert_eq!(write.measurements_written, 2);
        assert_eq!(write.rpc_rows_appended, 1);

        let header = store.latest_header(network.id).await.unwrap().unwrap();
        assert_eq!(header.id, write.header_id);
        assert_eq!(header.measurement_id, cycle.measurement_id);

        let stored = store.measurements_for_header(write.header_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].up);
        assert_eq!(stored[0].block_number, Some(31_000_000));
        assert_eq!(stored[0].is_syncing, Some(false));
        assert!(!stored[1].up);
        assert_eq!(stored[1].status_code, None);
        assert_eq!(stored[1].is_syncing, None);
    }

    #[tokio::test]
    async fn test_rpc_history_appends_only_on_change() {
        let store = memory_store().await;
        let (network, validators) = seeded(&store).await;
        let v1 = validators[0].id;

        for url in ["https://a", "https://a", "https://b"] {
            store
                .persist_cycle(&record(network.id, vec![], &[(v1, url)]))
                .await
                .unwrap();
        }

        let history = store.rpc_history(network.id, v1).await.unwrap();
        let urls: Vec<_> = history.iter().map(|r| r.rpc_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b"]);
        assert!(history[0].rpc_measurement_header_id < history[1].rpc_measurement_header_id);

        let latest = store.latest_validator_rpc(network.id, v1).await.unwrap().unwrap();
        assert_eq!(latest.rpc_url, "https://b");
        assert_eq!(
            store
                .latest_rpc_url_for_address(network.id, "0xV1")
                .await
                .unwrap()
                .as_deref(),
            Some("https://b")
        );
        assert_eq!(
            store.latest_rpc_url_for_address(network.id, "0xV2").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_failed_cycle_rolls_back_header() {
        let store = memory_store().await;
        let (network, validators) = seeded(&store).await;

        // Duplicate (header, validator) pair violates the unique constraint
        let duplicate = vec![
            NewMeasurement::unreachable(validators[0].id),
            NewMeasurement::unreachable(validators[0].id),
        ];
        let result = store.persist_cycle(&record(network.id, duplicate, &[])).await;

        assert!(result.is_err());
        assert!(store.latest_header(network.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_validator_rpc_url() {
        let store = memory_store().await;
        let (network, validators) = seeded(&store).await;

        store
            .update_validator_rpc_url(validators[1].id, "https://v2")
            .await
            .unwrap();

        let refreshed = store
            .validators_by_addresses(network.id, &["0xV2".to_string()])
            .await
            .unwrap();
        assert_eq!(refreshed[0].rpc_url.as_deref(), Some("https://v2"));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite:{}?mode=rwc", dir.path().join("indexer.db").display()),
            max_connections: 1,
            ..Default::default()
        };

        let store = SqliteStore::connect(&config).await.unwrap();
        let network = store.get_or_insert_network("celo").await.unwrap();
        store.close().await;

        let reopened = SqliteStore::connect(&config).await.unwrap();
        let again = reopened.get_or_insert_network("celo").await.unwrap();
        assert_eq!(network.id, again.id);
        reopened.close().await;
    }
}
