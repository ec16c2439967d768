//! # PostgreSQL Storage
//!
//! Storage backend over a single key/value table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS <table> (
//!     pk   TEXT  NOT NULL,
//!     sk   TEXT  NOT NULL DEFAULT '',
//!     item JSONB NOT NULL,
//!     PRIMARY KEY (pk, sk)
//! )
//! ```
//!
//! Queries are built at runtime (the table name is configuration), so the unchecked
//! `sqlx::query*` functions are used rather than the compile-time macros.

use super::{Item, StorageBackend, StorageError, StorageKey, StorageResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, error, info};

/// PostgreSQL-backed storage
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
    table_name: String,
}

impl PostgresStorage {
    /// Connect a new pool
    pub async fn connect(
        database_url: &str,
        table_name: &str,
        max_connections: u32,
    ) -> StorageResult<Self> {
        info!(table_name = %table_name, max_connections, "Connecting storage pool");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Self::new_with_pool(pool, table_name)
    }

    /// Create storage over an existing pool
    pub fn new_with_pool(pool: PgPool, table_name: &str) -> StorageResult<Self> {
        validate_table_name(table_name)?;

        Ok(Self {
            pool,
            table_name: table_name.to_string(),
        })
    }

    /// Create the backing table if it doesn't exist
    pub async fn ensure_table(&self) -> StorageResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                pk TEXT NOT NULL, \
                sk TEXT NOT NULL DEFAULT '', \
                item JSONB NOT NULL, \
                PRIMARY KEY (pk, sk))",
            self.table_name
        );

        sqlx::query(&sql).execute(&self.pool).await?;

        info!(table_name = %self.table_name, "Storage table ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StorageBackend for PostgresStorage {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn get(&self, key: &StorageKey) -> StorageResult<Item> {
        debug!(key = %key, "Get");

        let sql = format!(
            "SELECT item FROM {} WHERE pk = $1 AND sk = $2",
            self.table_name
        );

        let row: Option<Value> = sqlx::query_scalar(&sql)
            .bind(key.partition_value())
            .bind(key.sort_value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "GetItem");
                StorageError::read(key, e.to_string())
            })?;

        match row {
            Some(Value::Object(item)) => Ok(item),
            Some(other) => Err(StorageError::serialization(format!(
                "stored item for {key} is not an object: {other}"
            ))),
            None => Err(StorageError::not_found(key)),
        }
    }

    async fn put(&self, key: &StorageKey, item: Item) -> StorageResult<()> {
        debug!(key = %key, "Put");

        let sql = format!(
            "INSERT INTO {} (pk, sk, item) VALUES ($1, $2, $3) \
             ON CONFLICT (pk, sk) DO UPDATE SET item = EXCLUDED.item",
            self.table_name
        );

        sqlx::query(&sql)
            .bind(key.partition_value())
            .bind(key.sort_value())
            .bind(Value::Object(item))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "PutItem");
                StorageError::write(key, e.to_string())
            })?;

        Ok(())
    }

    async fn try_increment(&self, key: &StorageKey, field: &str) -> StorageResult<()> {
        let sql = format!(
            "UPDATE {} \
             SET item = jsonb_set(item, ARRAY[$3], to_jsonb(COALESCE((item->>$3)::bigint, 0) + 1)) \
             WHERE pk = $1 AND sk = $2 \
             RETURNING pk",
            self.table_name
        );

        let updated: Option<String> = sqlx::query_scalar(&sql)
            .bind(key.partition_value())
            .bind(key.sort_value())
            .bind(field)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(key = %key, field = %field, error = %e, "UpdateItem");
                StorageError::write(key, e.to_string())
            })?;

        updated.map(|_| ()).ok_or_else(|| StorageError::not_found(key))
    }

    async fn is_available(&self) -> bool {
        let result: Result<bool, sqlx::Error> =
            sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
                .bind(&self.table_name)
                .fetch_one(&self.pool)
                .await;

        match result {
            Ok(true) => true,
            Ok(false) => {
                error!(table_name = %self.table_name, "TableIsAvailable: table does not exist");
                false
            }
            Err(e) => {
                error!(table_name = %self.table_name, error = %e, "TableIsAvailable");
                false
            }
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are accepted
fn validate_table_name(table_name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidTableName {
        table_name: table_name.to_string(),
        reason: reason.to_string(),
    };

    let first = table_name.chars().next().ok_or_else(|| invalid("empty"))?;

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or underscore"));
    }
    if !table_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid("only ASCII letters, digits and underscores are allowed"));
    }
    if table_name.len() > 63 {
        return Err(invalid("longer than 63 characters"));
    }
    Ok(())
}
