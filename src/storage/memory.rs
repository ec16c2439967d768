//! # In-Memory Storage
//!
//! `DashMap`-backed storage backend for local runs and tests. Every operation can be made to
//! fail on demand so the failure paths of the ledger and the services can be exercised.
//!
//! ```rust
//! use event_core::storage::{InMemoryStorage, StorageBackend, StorageKey, StorageOperation};
//!
//! # tokio_test::block_on(async {
//! let storage = InMemoryStorage::default();
//! let key = StorageKey::partition("PK", "hits");
//!
//! storage.increment(&key, "Count").await.unwrap();
//! assert_eq!(storage.get(&key).await.unwrap()["Count"], 1);
//!
//! storage.fail_on(StorageOperation::Get);
//! assert!(storage.get(&key).await.is_err());
//! # });
//! ```

use super::{Item, StorageBackend, StorageError, StorageKey, StorageResult};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, error};

/// Storage operations that can be failed on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    Get,
    Put,
    Increment,
    Describe,
}

/// In-process storage backend
#[derive(Debug)]
pub struct InMemoryStorage {
    table_name: String,
    items: DashMap<(String, String), Item>,
    failing: Mutex<HashSet<StorageOperation>>,
}

impl InMemoryStorage {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            items: DashMap::new(),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make every subsequent call of `operation` fail until cleared
    pub fn fail_on(&self, operation: StorageOperation) {
        self.failing.lock().insert(operation);
    }

    pub fn clear_failure(&self, operation: StorageOperation) {
        self.failing.lock().remove(&operation);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot of every item whose partition value starts with `prefix`
    pub fn items_with_prefix(&self, prefix: &str) -> Vec<Item> {
        self.items
            .iter()
            .filter(|entry| entry.key().0.starts_with(prefix))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Snapshot of every stored item
    pub fn items(&self) -> Vec<Item> {
        self.items_with_prefix("")
    }

    fn is_failing(&self, operation: StorageOperation) -> bool {
        self.failing.lock().contains(&operation)
    }

    fn map_key(key: &StorageKey) -> (String, String) {
        (key.partition_value().to_string(), key.sort_value().to_string())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new("events")
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn get(&self, key: &StorageKey) -> StorageResult<Item> {
        debug!(key = %key, "Get");

        if self.is_failing(StorageOperation::Get) {
            error!(key = %key, "GetItem: injected failure");
            return Err(StorageError::read(key, "injected failure"));
        }

        self.items
            .get(&Self::map_key(key))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn put(&self, key: &StorageKey, item: Item) -> StorageResult<()> {
        debug!(key = %key, "Put");

        if self.is_failing(StorageOperation::Put) {
            error!(key = %key, "PutItem: injected failure");
            return Err(StorageError::write(key, "injected failure"));
        }

        self.items.insert(Self::map_key(key), item);
        Ok(())
    }

    async fn try_increment(&self, key: &StorageKey, field: &str) -> StorageResult<()> {
        if self.is_failing(StorageOperation::Increment) {
            error!(key = %key, field = %field, "UpdateItem: injected failure");
            return Err(StorageError::write(key, "injected failure"));
        }

        let mut entry = self
            .items
            .get_mut(&Self::map_key(key))
            .ok_or_else(|| StorageError::not_found(key))?;

        let next = match entry.get(field) {
            None => 1,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(current) => current
                    .checked_add(1)
                    .ok_or_else(|| StorageError::write(key, format!("field {field} overflow")))?,
                None => {
                    return Err(StorageError::write(
                        key,
                        format!("field {field} is not an integer"),
                    ))
                }
            },
            Some(_) => {
                return Err(StorageError::write(
                    key,
                    format!("field {field} is not numeric"),
                ))
            }
        };

        entry.insert(field.to_string(), Value::from(next));
        Ok(())
    }

    async fn is_available(&self) -> bool {
        if self.is_failing(StorageOperation::Describe) {
            error!(table_name = %self.table_name, "TableIsAvailable: injected failure");
            return false;
        }
        true
    }
}
