//! Shared fixtures

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use event_core::idempotency::{EventIdentity, IdempotencyLedger, LedgerError, LedgerResult};
use event_core::models::{Message, Reception};
use event_core::services::{FixedClock, QueueMessage, ServiceOptions};
use event_core::storage::{InMemoryStorage, StorageError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const SENT: &str = "2025-01-01T00:00:00Z";
pub const CLIENT: &str = "1.2.3.4";

pub fn processing_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 5).unwrap()
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(processing_time()))
}

pub fn options(clock: Arc<FixedClock>) -> ServiceOptions {
    ServiceOptions::default().with_clock(clock)
}

pub fn body(sent: &str, path: &str, client: &str) -> String {
    let message = Message {
        sent: sent.to_string(),
        path: path.to_string(),
        client: client.to_string(),
    };
    message.to_json().unwrap()
}

pub fn record(id: &str, path: &str) -> QueueMessage {
    QueueMessage::new(id, body(SENT, path, CLIENT))
}

/// Receptions stored under `pk`, ordered by `Received`
pub fn receptions(storage: &InMemoryStorage, pk: &str) -> Vec<Reception> {
    let mut receptions: Vec<Reception> = storage
        .items()
        .into_iter()
        .filter(|item| item.get("PK").and_then(Value::as_str) == Some(pk))
        .map(|item| serde_json::from_value(Value::Object(item)).unwrap())
        .collect();
    receptions.sort_by(|a, b| a.received.cmp(&b.received));
    receptions
}

/// Wraps a ledger and fails every `mark_processed` while `failing` is set
pub struct FlakyMarkLedger<L> {
    inner: L,
    failing: AtomicBool,
}

impl<L> FlakyMarkLedger<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl<L: IdempotencyLedger> IdempotencyLedger for FlakyMarkLedger<L> {
    async fn has_been_processed(&self, identity: &EventIdentity) -> LedgerResult<bool> {
        self.inner.has_been_processed(identity).await
    }

    async fn mark_processed(&self, identity: &EventIdentity) -> LedgerResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage(StorageError::write(
                identity.to_string(),
                "provisioned throughput exceeded",
            )));
        }
        self.inner.mark_processed(identity).await
    }
}
