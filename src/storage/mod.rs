//! # Storage Backend
//!
//! Key-addressed durable store used by the idempotency ledger, the subscriber services and
//! (optionally) the shared suspend flag.
//!
//! Items are JSON objects addressed by a [`StorageKey`]: a partition attribute plus an
//! optional sort attribute. `get` and `put` are unconditional and last-writer-wins; the only
//! atomic primitive is [`StorageBackend::increment`], which falls back to creating the item
//! when the conditional update reports that it does not exist.

pub mod errors;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

pub use errors::{StorageError, StorageResult};
pub use memory::{InMemoryStorage, StorageOperation};
pub use postgres::PostgresStorage;

/// A stored item
pub type Item = Map<String, Value>;

/// One named key attribute of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyAttribute {
    pub name: String,
    pub value: String,
}

/// Primary key of an item: partition attribute plus optional sort attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub partition: KeyAttribute,
    pub sort: Option<KeyAttribute>,
}

impl StorageKey {
    pub fn partition(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            partition: KeyAttribute {
                name: name.into(),
                value: value.into(),
            },
            sort: None,
        }
    }

    pub fn with_sort(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.sort = Some(KeyAttribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn partition_value(&self) -> &str {
        &self.partition.value
    }

    /// Sort value, empty when the key has no sort attribute
    pub fn sort_value(&self) -> &str {
        self.sort.as_ref().map(|s| s.value.as_str()).unwrap_or("")
    }

    /// The key attributes rendered as a fresh item
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(
            self.partition.name.clone(),
            Value::String(self.partition.value.clone()),
        );
        if let Some(sort) = &self.sort {
            item.insert(sort.name.clone(), Value::String(sort.value.clone()));
        }
        item
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.partition.name, self.partition.value)?;
        if let Some(sort) = &self.sort {
            write!(f, ",{}={}", sort.name, sort.value)?;
        }
        Ok(())
    }
}

/// Records that know their own storage key
pub trait Keyed {
    fn storage_key(&self) -> StorageKey;
}

/// Durable key/value store contract
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backing table
    fn table_name(&self) -> &str;

    /// Fetch an item, `StorageError::NotFound` when absent
    async fn get(&self, key: &StorageKey) -> StorageResult<Item>;

    /// Unconditionally write an item
    async fn put(&self, key: &StorageKey, item: Item) -> StorageResult<()>;

    /// Atomically add 1 to a numeric field of an existing item.
    ///
    /// Must fail with `StorageError::NotFound` when the item does not exist; callers
    /// normally go through [`increment`](Self::increment) instead.
    async fn try_increment(&self, key: &StorageKey, field: &str) -> StorageResult<()>;

    /// Increment `field`, creating the item with `field = 1` if it does not exist yet.
    async fn increment(&self, key: &StorageKey, field: &str) -> StorageResult<()> {
        debug!(key = %key, field = %field, "Increment");

        match self.try_increment(key, field).await {
            Err(err) if err.is_not_found() => {
                debug!(key = %key, field = %field, "Increment target missing, creating item");

                let mut item = key.to_item();
                item.insert(field.to_string(), Value::from(1));
                self.put(key, item).await
            }
            result => result,
        }
    }

    /// Non-blocking health check. Errors are logged, never surfaced.
    async fn is_available(&self) -> bool;
}

/// Typed helpers over any [`StorageBackend`]
#[async_trait]
pub trait StorageBackendExt: StorageBackend {
    async fn put_record<T>(&self, record: &T) -> StorageResult<()>
    where
        T: Keyed + Serialize + Sync,
    {
        let key = record.storage_key();
        let item = to_item(record)?;
        self.put(&key, item).await
    }

    async fn get_record<T>(&self, key: &StorageKey) -> StorageResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let item = self.get(key).await?;
        Ok(serde_json::from_value(Value::Object(item))?)
    }
}

impl<S: StorageBackend + ?Sized> StorageBackendExt for S {}

/// Serialize a record into an item; records must serialize to JSON objects
pub fn to_item<T: Serialize>(record: &T) -> StorageResult<Item> {
    match serde_json::to_value(record)? {
        Value::Object(item) => Ok(item),
        other => Err(StorageError::serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
