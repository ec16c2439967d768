//! # Event Core Configuration
//!
//! Layered configuration: `config/event-core.toml`, then `config/<environment>.toml`, then
//! `EVENT_CORE__SECTION__KEY` environment variables. Every field has a default, so an empty
//! directory yields a working in-memory setup.
//!
//! ```rust,no_run
//! use event_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let subscriber_id = &manager.config().subscriber.id;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::idempotency::MarkerFailurePolicy;
use crate::services::ServiceOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventCoreConfig {
    pub storage: StorageConfig,
    pub subscriber: SubscriberConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub table_name: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            table_name: "events".to_string(),
            database_url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    #[default]
    Continuous,
    Suspendable,
}

/// Where the suspendable subscriber keeps its flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendFlagKind {
    /// Process-local; each instance has its own flag
    #[default]
    Local,
    /// Shared record in the storage table
    Storage,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriberConfig {
    pub id: String,
    pub mode: ServiceMode,
    pub initially_suspended: bool,
    /// Delay of the `sleep` command
    pub sleep_seconds: u64,
    /// Continuous mode only: consult the idempotency ledger
    pub deduplication: bool,
    pub marker_failure_policy: MarkerFailurePolicy,
    pub suspend_flag: SuspendFlagKind,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            id: "sub1".to_string(),
            mode: ServiceMode::Continuous,
            initially_suspended: false,
            sleep_seconds: 20,
            deduplication: true,
            marker_failure_policy: MarkerFailurePolicy::Swallow,
            suspend_flag: SuspendFlagKind::Local,
        }
    }
}

impl SubscriberConfig {
    pub fn sleep_delay(&self) -> Duration {
        Duration::from_secs(self.sleep_seconds)
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions::default()
            .with_marker_failure_policy(self.marker_failure_policy)
            .with_sleep_delay(self.sleep_delay())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_concurrency: usize,
    pub batch_size: usize,
    /// Per-message processing deadline; unset means no deadline
    pub message_timeout_seconds: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: crate::dispatch::DEFAULT_MAX_CONCURRENCY,
            batch_size: 10,
            message_timeout_seconds: None,
        }
    }
}

impl DispatchConfig {
    pub fn message_timeout(&self) -> Option<Duration> {
        self.message_timeout_seconds.map(Duration::from_secs)
    }
}

impl EventCoreConfig {
    /// Check cross-field constraints the types cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.subscriber.id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "id",
                "subscriber configuration",
            ));
        }

        if self.storage.table_name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "table_name",
                "storage configuration",
            ));
        }

        if self.storage.backend == StorageBackendKind::Postgres {
            match self.storage.database_url.as_deref() {
                Some(url) if !url.trim().is_empty() => {}
                _ => {
                    return Err(ConfigurationError::missing_required_field(
                        "database_url",
                        "storage configuration (postgres backend)",
                    ))
                }
            }

            if self.storage.max_connections == 0 {
                return Err(ConfigurationError::invalid_value(
                    "storage.max_connections",
                    "0",
                    "must be greater than 0",
                ));
            }
        }

        if self.dispatch.max_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.max_concurrency",
                "0",
                "must be greater than 0",
            ));
        }

        if self.dispatch.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.batch_size",
                "0",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}
