use crate::support::{self, FlakyMarkLedger, CLIENT, SENT};
use chrono::Duration;
use event_core::error::EventCoreError;
use event_core::idempotency::{
    EventIdentity, IdempotencyLedger, MarkerFailurePolicy, ProcessOutcome, StorageLedger,
};
use event_core::models::format_timestamp;
use event_core::services::{ContinuousService, QueueMessage, SubService};
use event_core::storage::{InMemoryStorage, StorageOperation};
use std::sync::Arc;

const PK: &str = "2025-01-01T00:00:00Z/sub1";

fn service(
    storage: &Arc<InMemoryStorage>,
) -> ContinuousService<InMemoryStorage, StorageLedger<InMemoryStorage>> {
    let ledger = Arc::new(StorageLedger::new(storage.clone()));
    ContinuousService::new(
        "sub1",
        storage.clone(),
        ledger,
        support::options(support::clock()),
    )
}

#[tokio::test]
async fn test_end_to_end_reception() {
    let storage = Arc::new(InMemoryStorage::default());
    let service = service(&storage);

    service
        .handle(&support::record("m1", "/test/ok"))
        .await
        .unwrap();

    let receptions = support::receptions(&storage, PK);
    assert_eq!(receptions.len(), 1);

    let reception = &receptions[0];
    assert_eq!(reception.pk, PK);
    assert_eq!(reception.subscriber, "sub1");
    assert_eq!(reception.received, format_timestamp(support::processing_time()));
    assert_eq!(reception.message.sent, SENT);
    assert_eq!(reception.message.path, "/test/ok");
    assert_eq!(reception.message.client, CLIENT);
}

#[tokio::test]
async fn test_redeliveries_are_suppressed() {
    let storage = Arc::new(InMemoryStorage::default());
    let service = service(&storage);
    let record = support::record("m1", "/test/ok");

    assert_eq!(
        service.process(&record).await.unwrap(),
        ProcessOutcome::Processed
    );
    for _ in 0..5 {
        assert_eq!(
            service.process(&record).await.unwrap(),
            ProcessOutcome::AlreadyProcessed
        );
    }

    assert_eq!(support::receptions(&storage, PK).len(), 1);
}

#[tokio::test]
async fn test_distinct_sent_is_distinct_identity() {
    let storage = Arc::new(InMemoryStorage::default());
    let service = service(&storage);

    service
        .handle(&QueueMessage::new(
            "m1",
            support::body("2025-01-01T00:00:00Z", "/test/ok", CLIENT),
        ))
        .await
        .unwrap();
    service
        .handle(&QueueMessage::new(
            "m2",
            support::body("2025-01-01T00:00:01Z", "/test/ok", CLIENT),
        ))
        .await
        .unwrap();

    assert_eq!(support::receptions(&storage, PK).len(), 1);
    assert_eq!(
        support::receptions(&storage, "2025-01-01T00:00:01Z/sub1").len(),
        1
    );
}

#[tokio::test]
async fn test_missing_client_is_still_deduplicated() {
    let storage = Arc::new(InMemoryStorage::default());
    let service = service(&storage);
    let record = QueueMessage::new("m1", r#"{"Sent":"2025-01-01T00:00:00Z","Path":"/x"}"#);

    for _ in 0..3 {
        service.handle(&record).await.unwrap();
    }

    let receptions = support::receptions(&storage, PK);
    assert_eq!(receptions.len(), 1);
    assert_eq!(receptions[0].message.path, "/x");
    assert!(receptions[0].message.client.is_empty());
}

#[tokio::test]
async fn test_ledger_read_failure_writes_nothing() {
    let storage = Arc::new(InMemoryStorage::default());
    let service = service(&storage);
    storage.fail_on(StorageOperation::Get);

    let err = service
        .handle(&support::record("m1", "/test/ok"))
        .await
        .unwrap_err();

    assert!(matches!(err, EventCoreError::LedgerRead(_)));
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_put_failure_is_redelivered_and_then_processed() {
    let storage = Arc::new(InMemoryStorage::default());
    let service = service(&storage);
    let record = support::record("m1", "/test/ok");

    storage.fail_on(StorageOperation::Put);
    let err = service.handle(&record).await.unwrap_err();
    assert!(matches!(err, EventCoreError::Processing(_)));

    storage.clear_failures();
    assert_eq!(
        service.process(&record).await.unwrap(),
        ProcessOutcome::Processed
    );
    assert_eq!(support::receptions(&storage, PK).len(), 1);
}

#[tokio::test]
async fn test_swallowed_marker_failure_reprocesses_redelivery() {
    let storage = Arc::new(InMemoryStorage::default());
    let ledger = Arc::new(FlakyMarkLedger::new(StorageLedger::new(storage.clone())));
    let clock = support::clock();
    let service = ContinuousService::new(
        "sub1",
        storage.clone(),
        ledger.clone(),
        support::options(clock.clone()),
    );
    let record = support::record("m1", "/test/ok");

    assert_eq!(
        service.process(&record).await.unwrap(),
        ProcessOutcome::Processed
    );

    clock.advance(Duration::seconds(1));
    ledger.recover();
    assert_eq!(
        service.process(&record).await.unwrap(),
        ProcessOutcome::Processed
    );

    clock.advance(Duration::seconds(1));
    assert_eq!(
        service.process(&record).await.unwrap(),
        ProcessOutcome::AlreadyProcessed
    );

    assert_eq!(support::receptions(&storage, PK).len(), 2);
    assert!(ledger
        .has_been_processed(&EventIdentity::new(CLIENT, SENT))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_propagated_marker_failure_is_an_error() {
    let storage = Arc::new(InMemoryStorage::default());
    let ledger = Arc::new(FlakyMarkLedger::new(StorageLedger::new(storage.clone())));
    let options = support::options(support::clock())
        .with_marker_failure_policy(MarkerFailurePolicy::Propagate);
    let service = ContinuousService::new("sub1", storage.clone(), ledger, options);

    let err = service
        .handle(&support::record("m1", "/test/ok"))
        .await
        .unwrap_err();

    assert!(matches!(err, EventCoreError::MarkerWrite(_)));
    assert_eq!(support::receptions(&storage, PK).len(), 1);
}

#[tokio::test]
async fn test_without_deduplication_records_every_delivery() {
    let storage = Arc::new(InMemoryStorage::default());
    let clock = support::clock();
    let service = ContinuousService::without_deduplication(
        "sub1",
        storage.clone(),
        support::options(clock.clone()),
    );
    let record = support::record("m1", "/test/ok");

    service.handle(&record).await.unwrap();
    clock.advance(Duration::milliseconds(1));
    service.handle(&record).await.unwrap();

    assert_eq!(support::receptions(&storage, PK).len(), 2);
}
