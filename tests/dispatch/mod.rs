use crate::support;
use event_core::dispatch::BatchDispatcher;
use event_core::services::{SubService, SuspendableService};
use event_core::state_machine::LocalSuspendFlag;
use event_core::storage::InMemoryStorage;
use std::sync::Arc;

fn dispatcher(max_concurrency: usize) -> (BatchDispatcher<dyn SubService>, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::default());
    let service: Arc<dyn SubService> = Arc::new(SuspendableService::new(
        "sub1",
        storage.clone(),
        Arc::new(LocalSuspendFlag::default()),
        support::options(support::clock()),
    ));
    (BatchDispatcher::new(service, max_concurrency), storage)
}

#[tokio::test]
async fn test_partial_batch_failure() {
    let (dispatcher, _storage) = dispatcher(4);

    let report = dispatcher
        .dispatch(vec![
            support::record("m1", "/test1/ok1"),
            support::record("m2", "/test1/error1"),
            support::record("m3", "/test1/ok3"),
        ])
        .await;

    assert_eq!(report.processed.len(), 2);
    assert_eq!(report.redeliver_ids(), vec!["m2"]);
    assert_eq!(report.failures[0].kind, "command");
    assert!(!report.is_fatal());
}

#[tokio::test]
async fn test_panic_command_halts_dispatcher() {
    let (dispatcher, storage) = dispatcher(1);

    let report = dispatcher
        .dispatch(vec![
            support::record("m1", "/test1/panic1"),
            support::record("m2", "/test1/ok2"),
        ])
        .await;

    let fatal = report.fatal.clone().unwrap();
    assert_eq!(fatal.message_id, "m1");
    assert_eq!(fatal.kind, "fatal_fault");
    assert!(dispatcher.is_halted());
    assert!(report.redeliver_ids().contains(&"m1"));

    let report = dispatcher
        .dispatch(vec![support::record("m3", "/test1/ok3")])
        .await;
    assert_eq!(report.skipped, vec!["m3".to_string()]);
    assert!(storage.len() <= 1);
}

#[tokio::test]
async fn test_report_serializes_as_json() {
    let (dispatcher, _storage) = dispatcher(2);

    let report = dispatcher
        .dispatch(vec![support::record("m1", "/test1/error1")])
        .await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["failures"][0]["message_id"], "m1");
    assert_eq!(json["failures"][0]["error"], "Command error: /test1/error1");
    assert!(json["fatal"].is_null());
}
