//! # Idempotency Ledger
//!
//! Marker store recording which `(PartitionKey, EventID)` identities have completed
//! processing. Presence of a marker means "do not reprocess".

use crate::models::format_timestamp;
use crate::storage::{
    Keyed, StorageBackend, StorageBackendExt, StorageError, StorageKey, StorageResult,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub const MARKER_KEY_PREFIX: &str = "marker#";

/// Deduplication identity derived from an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventIdentity {
    pub partition_key: String,
    pub event_id: String,
}

impl EventIdentity {
    pub fn new(partition_key: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            event_id: event_id.into(),
        }
    }

    /// Storage key of the marker for this identity.
    ///
    /// The partition key is length-prefixed so that `#` inside either part cannot make two
    /// identities share a marker.
    pub fn marker_key(&self) -> StorageKey {
        StorageKey::partition(
            "PK",
            format!(
                "{MARKER_KEY_PREFIX}{}:{}#{}",
                self.partition_key.len(),
                self.partition_key,
                self.event_id
            ),
        )
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.event_id)
    }
}

/// Ledger error types
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Durable record of processed identities
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    async fn has_been_processed(&self, identity: &EventIdentity) -> LedgerResult<bool>;

    async fn mark_processed(&self, identity: &EventIdentity) -> LedgerResult<()>;
}

/// Ledger that never remembers anything: every event looks unprocessed and marking is a
/// no-op. Used by handlers that have not been wired for deduplication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLedger;

#[async_trait]
impl IdempotencyLedger for NullLedger {
    async fn has_been_processed(&self, _identity: &EventIdentity) -> LedgerResult<bool> {
        Ok(false)
    }

    async fn mark_processed(&self, _identity: &EventIdentity) -> LedgerResult<()> {
        Ok(())
    }
}

/// Persisted marker item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedMarker {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "EventID")]
    pub event_id: String,
    #[serde(rename = "ProcessedAt")]
    pub processed_at: String,
}

impl ProcessedMarker {
    pub fn new(identity: &EventIdentity) -> Self {
        Self {
            pk: identity.marker_key().partition.value,
            partition_key: identity.partition_key.clone(),
            event_id: identity.event_id.clone(),
            processed_at: format_timestamp(Utc::now()),
        }
    }
}

impl Keyed for ProcessedMarker {
    fn storage_key(&self) -> StorageKey {
        StorageKey::partition("PK", &self.pk)
    }
}

/// Ledger keeping its markers in a [`StorageBackend`], in a key namespace of their own
pub struct StorageLedger<S: ?Sized> {
    storage: Arc<S>,
}

impl<S: StorageBackend + ?Sized> StorageLedger<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: StorageBackend + ?Sized> IdempotencyLedger for StorageLedger<S> {
    async fn has_been_processed(&self, identity: &EventIdentity) -> LedgerResult<bool> {
        debug!(identity = %identity, "Checking ledger");

        let marker: StorageResult<ProcessedMarker> =
            self.storage.get_record(&identity.marker_key()).await;

        match marker {
            Ok(marker)
                if marker.partition_key == identity.partition_key
                    && marker.event_id == identity.event_id =>
            {
                Ok(true)
            }
            Ok(marker) => {
                warn!(
                    identity = %identity,
                    marker_partition_key = %marker.partition_key,
                    marker_event_id = %marker.event_id,
                    "Marker records another identity, treating as not processed"
                );
                Ok(false)
            }
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn mark_processed(&self, identity: &EventIdentity) -> LedgerResult<()> {
        debug!(identity = %identity, "Marking as processed");

        let marker = ProcessedMarker::new(identity);
        self.storage.put_record(&marker).await?;
        Ok(())
    }
}
