use event_core::config::{
    ConfigManager, ConfigurationError, ServiceMode, StorageBackendKind, SuspendFlagKind,
};
use event_core::idempotency::MarkerFailurePolicy;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const BASE: &str = r#"
[storage]
table_name = "receptions"

[subscriber]
id = "sub1"
mode = "suspendable"
sleep_seconds = 2
suspend_flag = "storage"

[dispatch]
max_concurrency = 8
batch_size = 25
"#;

fn config_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("event-core.toml"), BASE).unwrap();
    dir
}

#[test]
fn test_base_file() {
    let dir = config_dir();

    let manager =
        ConfigManager::load_with_env_vars(Some(dir.path().to_path_buf()), "test", HashMap::new())
            .unwrap();
    let config = manager.config();

    assert_eq!(config.storage.table_name, "receptions");
    assert_eq!(config.storage.backend, StorageBackendKind::Memory);
    assert_eq!(config.subscriber.mode, ServiceMode::Suspendable);
    assert_eq!(config.subscriber.suspend_flag, SuspendFlagKind::Storage);
    assert_eq!(config.subscriber.sleep_delay(), Duration::from_secs(2));
    assert_eq!(config.dispatch.batch_size, 25);
    assert_eq!(config.dispatch.message_timeout(), None);
    assert_eq!(manager.config_directory(), dir.path());
}

#[test]
fn test_production_overlay() {
    let dir = config_dir();
    fs::write(
        dir.path().join("production.toml"),
        r#"
[storage]
backend = "postgres"
database_url = "postgresql://db/events"

[subscriber]
marker_failure_policy = "propagate"

[dispatch]
message_timeout_seconds = 30
"#,
    )
    .unwrap();

    let manager = ConfigManager::load_with_env_vars(
        Some(dir.path().to_path_buf()),
        "production",
        HashMap::new(),
    )
    .unwrap();
    let config = manager.config();

    assert_eq!(config.storage.backend, StorageBackendKind::Postgres);
    assert_eq!(config.storage.table_name, "receptions");
    assert_eq!(
        config.subscriber.marker_failure_policy,
        MarkerFailurePolicy::Propagate
    );
    assert_eq!(config.dispatch.message_timeout(), Some(Duration::from_secs(30)));

    let development = ConfigManager::load_with_env_vars(
        Some(dir.path().to_path_buf()),
        "development",
        HashMap::new(),
    )
    .unwrap();
    assert_eq!(development.config().storage.backend, StorageBackendKind::Memory);
}

#[test]
fn test_env_override_booleans() {
    let dir = config_dir();
    let vars = HashMap::from([
        (
            "EVENT_CORE__SUBSCRIBER__INITIALLY_SUSPENDED".to_string(),
            "true".to_string(),
        ),
        (
            "EVENT_CORE__SUBSCRIBER__DEDUPLICATION".to_string(),
            "false".to_string(),
        ),
    ]);

    let manager =
        ConfigManager::load_with_env_vars(Some(dir.path().to_path_buf()), "test", vars).unwrap();

    assert!(manager.config().subscriber.initially_suspended);
    assert!(!manager.config().subscriber.deduplication);
}

#[test]
fn test_postgres_without_url_is_rejected() {
    let dir = config_dir();
    let vars = HashMap::from([(
        "EVENT_CORE__STORAGE__BACKEND".to_string(),
        "postgres".to_string(),
    )]);

    let result = ConfigManager::load_with_env_vars(Some(dir.path().to_path_buf()), "test", vars);

    assert!(matches!(
        result,
        Err(ConfigurationError::MissingRequiredField { .. })
    ));
}

#[test]
fn test_malformed_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("event-core.toml"), "[dispatch\nmax_concurrency = ").unwrap();

    let result =
        ConfigManager::load_with_env_vars(Some(dir.path().to_path_buf()), "test", HashMap::new());

    assert!(matches!(result, Err(ConfigurationError::LoadError { .. })));
}
