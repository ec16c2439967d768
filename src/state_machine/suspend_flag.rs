//! # Suspend Flag
//!
//! Where the suspendable subscriber keeps its `Enabled`/`Suspended` state.
//!
//! Neither implementation offers compare-and-set. A handler reads the flag, interprets the
//! command and then writes the flag, so a `suspend` and a `resume` handled concurrently can
//! leave either outcome.

use super::states::SubscriberState;
use crate::models::format_timestamp;
use crate::storage::{Keyed, StorageBackend, StorageBackendExt, StorageKey, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

pub const SUSPEND_KEY_PREFIX: &str = "suspend#";

/// Shared suspend/resume flag
#[async_trait]
pub trait SuspendFlag: Send + Sync {
    async fn is_suspended(&self) -> StorageResult<bool>;

    async fn set_suspended(&self, suspended: bool) -> StorageResult<()>;

    async fn state(&self) -> StorageResult<SubscriberState> {
        Ok(SubscriberState::from_suspended(self.is_suspended().await?))
    }
}

/// Process-local flag, invisible to other instances
#[derive(Debug, Default)]
pub struct LocalSuspendFlag {
    suspended: AtomicBool,
}

impl LocalSuspendFlag {
    pub fn new(initially_suspended: bool) -> Self {
        Self {
            suspended: AtomicBool::new(initially_suspended),
        }
    }
}

#[async_trait]
impl SuspendFlag for LocalSuspendFlag {
    async fn is_suspended(&self) -> StorageResult<bool> {
        Ok(self.suspended.load(Ordering::SeqCst))
    }

    async fn set_suspended(&self, suspended: bool) -> StorageResult<()> {
        self.suspended.store(suspended, Ordering::SeqCst);
        Ok(())
    }
}

/// Persisted flag record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendRecord {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "Suspended")]
    pub suspended: bool,
    #[serde(rename = "UpdatedAt")]
    pub updated_at: String,
}

impl Keyed for SuspendRecord {
    fn storage_key(&self) -> StorageKey {
        StorageKey::partition("PK", &self.pk)
    }
}

/// Flag kept as a single record in the storage backend.
///
/// Visible to every instance sharing the table, but writes are unconditional puts
/// (last writer wins).
pub struct StoredSuspendFlag<S: ?Sized> {
    storage: Arc<S>,
    pk: String,
    initially_suspended: bool,
}

impl<S: StorageBackend + ?Sized> StoredSuspendFlag<S> {
    pub fn new(storage: Arc<S>, subscriber_id: &str, initially_suspended: bool) -> Self {
        Self {
            storage,
            pk: format!("{SUSPEND_KEY_PREFIX}{subscriber_id}"),
            initially_suspended,
        }
    }

    pub fn storage_key(&self) -> StorageKey {
        StorageKey::partition("PK", &self.pk)
    }
}

#[async_trait]
impl<S: StorageBackend + ?Sized> SuspendFlag for StoredSuspendFlag<S> {
    async fn is_suspended(&self) -> StorageResult<bool> {
        let record: StorageResult<SuspendRecord> =
            self.storage.get_record(&self.storage_key()).await;

        match record {
            Ok(record) => Ok(record.suspended),
            Err(err) if err.is_not_found() => Ok(self.initially_suspended),
            Err(err) => Err(err),
        }
    }

    async fn set_suspended(&self, suspended: bool) -> StorageResult<()> {
        debug!(pk = %self.pk, suspended, "Storing suspend flag");

        let record = SuspendRecord {
            pk: self.pk.clone(),
            suspended,
            updated_at: format_timestamp(Utc::now()),
        };
        self.storage.put_record(&record).await
    }
}
