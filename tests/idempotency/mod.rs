//! The gateway instantiated for an event type other than `Message`

use async_trait::async_trait;
use event_core::idempotency::{
    EventIdentity, GatewayError, IdempotencyLedger, IdentityError, ProcessOutcome,
    SingleshotGateway, SingleshotHandler, StorageLedger, MARKER_KEY_PREFIX,
};
use event_core::storage::{
    InMemoryStorage, StorageBackend, StorageError, StorageKey, StorageOperation,
};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Deposit {
    account: String,
    transaction_id: String,
}

/// Counts deposits per account with the storage increment primitive
struct DepositCounter {
    storage: Arc<InMemoryStorage>,
}

impl DepositCounter {
    fn key(account: &str) -> StorageKey {
        StorageKey::partition("PK", format!("deposits#{account}"))
    }
}

#[async_trait]
impl SingleshotHandler<Deposit> for DepositCounter {
    type Error = StorageError;

    fn unique_id(&self, event: &Deposit) -> Result<EventIdentity, IdentityError> {
        if event.transaction_id.is_empty() {
            return Err(IdentityError::new("deposit has no transaction id"));
        }
        Ok(EventIdentity::new(&event.account, &event.transaction_id))
    }

    async fn process(&self, event: &Deposit) -> Result<(), StorageError> {
        self.storage
            .increment(&Self::key(&event.account), "Count")
            .await
    }
}

fn deposit(account: &str, transaction_id: &str) -> Deposit {
    Deposit {
        account: account.to_string(),
        transaction_id: transaction_id.to_string(),
    }
}

async fn count(storage: &InMemoryStorage, account: &str) -> Option<i64> {
    storage
        .get(&DepositCounter::key(account))
        .await
        .ok()
        .and_then(|item| item.get("Count").and_then(Value::as_i64))
}

fn gateway(
    storage: &Arc<InMemoryStorage>,
) -> SingleshotGateway<Deposit, DepositCounter, StorageLedger<InMemoryStorage>> {
    SingleshotGateway::new(
        Arc::new(DepositCounter {
            storage: storage.clone(),
        }),
        Arc::new(StorageLedger::new(storage.clone())),
    )
}

#[tokio::test]
async fn test_each_transaction_counted_once() {
    let storage = Arc::new(InMemoryStorage::default());
    let gateway = gateway(&storage);

    for transaction_id in ["t1", "t2", "t1", "t3", "t2", "t1"] {
        gateway
            .process_once(&deposit("acct-1", transaction_id))
            .await
            .unwrap();
    }

    assert_eq!(count(&storage, "acct-1").await, Some(3));
    assert_eq!(storage.items_with_prefix(MARKER_KEY_PREFIX).len(), 3);
}

#[tokio::test]
async fn test_same_transaction_id_on_other_account() {
    let storage = Arc::new(InMemoryStorage::default());
    let gateway = gateway(&storage);

    gateway.process_once(&deposit("acct-1", "t1")).await.unwrap();
    gateway.process_once(&deposit("acct-2", "t1")).await.unwrap();

    assert_eq!(count(&storage, "acct-1").await, Some(1));
    assert_eq!(count(&storage, "acct-2").await, Some(1));
}

#[tokio::test]
async fn test_premarked_identity_is_skipped() {
    let storage = Arc::new(InMemoryStorage::default());
    let gateway = gateway(&storage);
    StorageLedger::new(storage.clone())
        .mark_processed(&EventIdentity::new("acct-1", "t1"))
        .await
        .unwrap();

    let outcome = gateway.process_once(&deposit("acct-1", "t1")).await.unwrap();

    assert_eq!(outcome, ProcessOutcome::AlreadyProcessed);
    assert!(!outcome.attempted());
    assert_eq!(count(&storage, "acct-1").await, None);
}

#[tokio::test]
async fn test_increment_failure_is_processing_error() {
    let storage = Arc::new(InMemoryStorage::default());
    let gateway = gateway(&storage);
    gateway.process_once(&deposit("acct-1", "t1")).await.unwrap();

    storage.fail_on(StorageOperation::Increment);
    let err = gateway
        .process_once(&deposit("acct-1", "t2"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Processing(_)));
    assert!(err.attempted());

    storage.clear_failures();
    gateway.process_once(&deposit("acct-1", "t2")).await.unwrap();
    assert_eq!(count(&storage, "acct-1").await, Some(2));
}

#[tokio::test]
async fn test_identity_error_is_not_attempted() {
    let storage = Arc::new(InMemoryStorage::default());
    let gateway = gateway(&storage);

    let err = gateway
        .process_once(&deposit("acct-1", ""))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Identity(_)));
    assert!(!err.attempted());
    assert!(storage.is_empty());
}
