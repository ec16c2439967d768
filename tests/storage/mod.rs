
use event_core::models::Reception;
use event_core::storage::{
    InMemoryStorage, Keyed, StorageBackend, StorageBackendExt, StorageKey, StorageOperation,
    StorageResult,
};
use event_core::Message;
use serde_json::Value;

#[tokio::test]
async fn test_increment_on_missing_item_creates_it() {
    let storage = InMemoryStorage::new("counters");
    let key = StorageKey::partition("PK", "hits").with_sort("Day", "2025-01-01");

    storage.increment(&key, "Count").await.unwrap();

    let item = storage.get(&key).await.unwrap();
    assert_eq!(item.get("Count"), Some(&Value::from(1)));
    assert_eq!(item.get("PK"), Some(&Value::from("hits")));
    assert_eq!(item.get("Day"), Some(&Value::from("2025-01-01")));

    storage.increment(&key, "Count").await.unwrap();
    let item = storage.get(&key).await.unwrap();
    assert_eq!(item.get("Count"), Some(&Value::from(2)));
}

#[tokio::test]
async fn test_increment_write_failure_skips_fallback() {
    let storage = InMemoryStorage::default();
    let key = StorageKey::partition("PK", "hits");
    storage.fail_on(StorageOperation::Increment);

    assert!(storage.increment(&key, "Count").await.is_err());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_reception_record_round_trip() {
    let storage = InMemoryStorage::default();
    let message = Message {
        sent: "2025-01-01T00:00:00Z".to_string(),
        path: "/test/ok".to_string(),
        client: "1.2.3.4".to_string(),
    };
    let reception = Reception::new("sub1", message);

    storage.put_record(&reception).await.unwrap();
    let stored: StorageResult<Reception> = storage.get_record(&reception.storage_key()).await;

    assert_eq!(stored.unwrap(), reception);
}

#[tokio::test]
async fn test_availability_check() {
    let storage = InMemoryStorage::default();
    assert!(storage.is_available().await);

    storage.fail_on(StorageOperation::Describe);
    assert!(!storage.is_available().await);
}
