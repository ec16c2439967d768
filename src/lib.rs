#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Event Core
//!
//! Runtime layer for consumers of an at-least-once message queue.
//!
//! ## Overview
//!
//! Queues redeliver. A consumer sees the same message more than once, sees partial failures
//! and runs many invocations at the same time. This crate provides the pieces that keep such
//! a consumer correct:
//!
//! - an idempotent "process exactly once if possible" gateway over a durable ledger
//! - a continuous subscriber that records each distinct message once
//! - a suspendable subscriber: a small state machine driven by commands in the message path
//! - the key/value storage contract all of the above depend on
//!
//! ## Module Organization
//!
//! - [`models`] - `Message` and `Reception` records
//! - [`storage`] - Storage backend trait, in-memory and PostgreSQL backends
//! - [`idempotency`] - Ledger and singleshot gateway
//! - [`state_machine`] - Subscriber states, path commands and the suspend flag
//! - [`services`] - Continuous and suspendable subscribers
//! - [`dispatch`] - Bounded-concurrency batch dispatch with fatal-fault halting
//! - [`config`] - Layered configuration
//! - [`error`] - Handler error kinds
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use event_core::idempotency::StorageLedger;
//! use event_core::services::{ContinuousService, QueueMessage, ServiceOptions, SubService};
//! use event_core::storage::InMemoryStorage;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(InMemoryStorage::default());
//! let ledger = Arc::new(StorageLedger::new(storage.clone()));
//! let service = ContinuousService::new("sub1", storage, ledger, ServiceOptions::default());
//!
//! let body = r#"{"Sent":"2025-01-01T00:00:00Z","Path":"/test/ok","Client":"1.2.3.4"}"#;
//! service.handle(&QueueMessage::new("m1", body)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod models;
pub mod services;
pub mod state_machine;
pub mod storage;

pub use config::{ConfigManager, EventCoreConfig};
pub use dispatch::{BatchDispatcher, BatchReport};
pub use error::{EventCoreError, EventCoreResult};
pub use idempotency::{
    IdempotencyLedger, MarkerFailurePolicy, NullLedger, SingleshotGateway, StorageLedger,
};
pub use models::{Message, Reception};
pub use services::{ContinuousService, QueueMessage, SubService, SuspendableService};
pub use state_machine::{LocalSuspendFlag, StoredSuspendFlag, SuspendFlag};
pub use storage::{InMemoryStorage, PostgresStorage, StorageBackend};
