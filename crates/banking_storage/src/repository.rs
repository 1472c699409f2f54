use anyhow::{Context, Result};
use async_trait::async_trait;
use banking_transfer::{HealthCheck, RequestContext, StoreError, Transfer, TransferStore};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub sqlite_path: String,
    pub max_connections: u32,
}

impl StorageConfig {
    pub fn new(sqlite_path: impl Into<String>) -> Self {
        Self {
            sqlite_path: sqlite_path.into(),
            max_connections: 5,
        }
    }

    /// Private in-memory database. Pinned to one connection, since every
    /// SQLite connection would otherwise open its own empty database.
    pub fn in_memory() -> Self {
        Self {
            sqlite_path: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BankingStorage {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow)]
struct TransferRow {
    transfer_id: String,
    account_origin_id: String,
    account_destination_id: String,
    amount: i64,
    created_at: String,
}

impl TryFrom<TransferRow> for Transfer {
    type Error = StoreError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.transfer_id).map_err(|e| {
            StoreError::Backend(format!("corrupt transfer_id {}: {e}", row.transfer_id))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| {
                StoreError::Backend(format!("corrupt created_at for transfer {id}: {e}"))
            })?
            .with_timezone(&Utc);

        Ok(Transfer {
            id,
            account_origin_id: row.account_origin_id,
            account_destination_id: row.account_destination_id,
            amount: row.amount,
            created_at,
        })
    }
}

impl BankingStorage {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let uri = normalize_sqlite_uri(&config.sqlite_path);
        let options = SqliteConnectOptions::from_str(&uri)
            .with_context(|| format!("invalid sqlite URI: {}", uri))?
            .create_if_missing(true);

        let mut pool_options =
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1));
        if uri.contains(":memory:") {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .context("failed to connect sqlite pool")?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA_SQL.split(';') {
            let sql = statement.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("migration failed for statement: {sql}"))?;
        }
        info!("banking sqlite schema ready");
        Ok(())
    }

    async fn insert_transfer(&self, transfer: &Transfer) -> Result<Uuid, StoreError> {
        let transfer_id = Uuid::now_v7();
        let created_at = transfer
            .created_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true);

        sqlx::query(
            "INSERT INTO transfers(transfer_id, account_origin_id, account_destination_id, amount, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(transfer_id.to_string())
        .bind(&transfer.account_origin_id)
        .bind(&transfer.account_destination_id)
        .bind(transfer.amount)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(
            transfer_id = %transfer_id,
            origin = %transfer.account_origin_id,
            destination = %transfer.account_destination_id,
            amount = transfer.amount,
            "transfer stored"
        );
        Ok(transfer_id)
    }

    async fn select_transfers(&self, account_id: &str) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query_as::<_, TransferRow>(
            "SELECT transfer_id, account_origin_id, account_destination_id, amount, created_at FROM transfers WHERE account_origin_id = ? OR account_destination_id = ? ORDER BY created_at ASC, transfer_id ASC",
        )
        .bind(account_id)
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Transfer::try_from).collect()
    }
}

#[async_trait]
impl HealthCheck for BankingStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl TransferStore for BankingStorage {
    async fn save_transfer(
        &self,
        ctx: &RequestContext,
        transfer: &Transfer,
    ) -> Result<Uuid, StoreError> {
        ctx.run(self.insert_transfer(transfer)).await.inspect_err(|error| {
            warn!(request_id = %ctx.request_id(), error = %error, "save_transfer failed");
        })
    }

    async fn list_all_transfers(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<Vec<Transfer>, StoreError> {
        ctx.run(self.select_transfers(account_id))
            .await
            .inspect_err(|error| {
                warn!(
                    request_id = %ctx.request_id(),
                    account_id = %account_id,
                    error = %error,
                    "list_all_transfers failed"
                );
            })
    }
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_check_violation() => {
            StoreError::Invalid(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable("sqlite pool timed out".to_string())
        }
        sqlx::Error::PoolClosed => StoreError::Unavailable("sqlite pool closed".to_string()),
        sqlx::Error::Io(io) => StoreError::Unavailable(io.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

fn normalize_sqlite_uri(raw: &str) -> String {
    if raw.starts_with("sqlite:") {
        raw.to_string()
    } else {
        format!("sqlite://{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_sqlite_uri, BankingStorage, StorageConfig};
    use banking_transfer::{
        HealthCheck, RequestContext, StoreError, Transfer, TransferStore, TransferUseCase,
    };
    use std::sync::Arc;

    async fn storage() -> BankingStorage {
        BankingStorage::connect(&StorageConfig::in_memory())
            .await
            .expect("connect")
    }

    #[test]
    fn normalizes_plain_paths() {
        assert_eq!(normalize_sqlite_uri("data/bank.db"), "sqlite://data/bank.db");
        assert_eq!(normalize_sqlite_uri("sqlite::memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn save_then_list_by_either_side() {
        let storage = storage().await;
        let ctx = RequestContext::background();

        let outgoing = storage
            .save_transfer(&ctx, &Transfer::new("acc-x", "acc-y", 2550))
            .await
            .expect("save");
        let incoming = storage
            .save_transfer(&ctx, &Transfer::new("acc-z", "acc-x", 100))
            .await
            .expect("save");
        storage
            .save_transfer(&ctx, &Transfer::new("acc-y", "acc-z", 7))
            .await
            .expect("save");

        let listed = storage
            .list_all_transfers(&ctx, "acc-x")
            .await
            .expect("list");

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, outgoing);
        assert_eq!(listed[0].amount, 2550);
        assert_eq!(listed[0].account_destination_id, "acc-y");
        assert_eq!(listed[1].id, incoming);
    }

    #[tokio::test]
    async fn list_for_unknown_account_is_empty() {
        let storage = storage().await;
        let listed = storage
            .list_all_transfers(&RequestContext::background(), "nobody")
            .await
            .expect("list");
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn check_constraints_surface_as_invalid() {
        let storage = storage().await;
        let ctx = RequestContext::background();

        let self_transfer = storage
            .save_transfer(&ctx, &Transfer::new("acc-x", "acc-x", 10))
            .await;
        assert!(matches!(self_transfer, Err(StoreError::Invalid(_))));

        let negative = storage
            .save_transfer(&ctx, &Transfer::new("acc-x", "acc-y", -10))
            .await;
        assert!(matches!(negative, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn duplicate_id_surfaces_as_conflict() {
        let storage = storage().await;
        let insert = "INSERT INTO transfers(transfer_id, account_origin_id, account_destination_id, amount, created_at) VALUES ('dup', 'acc-x', 'acc-y', 1, '2026-01-01T00:00:00Z')";
        sqlx::query(insert)
            .execute(storage.pool())
            .await
            .expect("first insert");

        let error = sqlx::query(insert)
            .execute(storage.pool())
            .await
            .expect_err("duplicate insert");

        assert!(matches!(
            super::map_sqlx_error(error),
            StoreError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn corrupt_rows_surface_as_backend_error() {
        let storage = storage().await;
        sqlx::query("INSERT INTO transfers(transfer_id, account_origin_id, account_destination_id, amount, created_at) VALUES ('not-a-uuid', 'acc-x', 'acc-y', 1, '2026-01-01T00:00:00Z')")
            .execute(storage.pool())
            .await
            .expect("insert");

        let listed = storage
            .list_all_transfers(&RequestContext::background(), "acc-x")
            .await;
        assert!(matches!(listed, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn cancelled_context_is_honored() {
        let storage = storage().await;
        let ctx = RequestContext::background();
        ctx.cancel_handle().cancel();

        let result = storage
            .save_transfer(&ctx, &Transfer::new("acc-x", "acc-y", 10))
            .await;
        assert_eq!(result, Err(StoreError::Cancelled));

        let listed = storage
            .list_all_transfers(&RequestContext::background(), "acc-x")
            .await
            .expect("list");
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn use_case_round_trip_over_sqlite() {
        let usecase = TransferUseCase::new(Arc::new(storage().await));
        let ctx = RequestContext::background();
        let transfer = Transfer::new("acc-x", "acc-y", 2550);

        let id = usecase
            .create_transfer(&ctx, &transfer)
            .await
            .expect("create");
        let listed = usecase.show_transfers(&ctx, "acc-y").await.expect("show");

        assert_eq!(listed, vec![transfer.with_id(id)]);
    }

    #[tokio::test]
    async fn ping_tracks_pool_state() {
        let storage = storage().await;
        storage.ping().await.expect("ping");

        storage.pool().close().await;
        assert!(matches!(
            storage.ping().await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
