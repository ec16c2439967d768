//! # Subscriber Services
//!
//! Handlers invoked once per delivered queue message. Every handler decodes the message
//! body into a [`Message`](crate::models::Message) and persists a
//! [`Reception`](crate::models::Reception) on success; they differ in what sits in between.
//!
//! - [`ContinuousService`]: deduplicates through the singleshot gateway
//! - [`SuspendableService`]: no deduplication; gates on the suspend flag and interprets the
//!   command embedded in the message path

pub mod clock;
pub mod continuous_service;
pub mod suspendable_service;

use crate::error::EventCoreResult;
use crate::idempotency::MarkerFailurePolicy;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub use clock::{Clock, FixedClock, SystemClock};
pub use continuous_service::{message_identity, ContinuousService, ReceptionRecorder};
pub use suspendable_service::SuspendableService;

/// Default delay of the `sleep` command
pub const DEFAULT_SLEEP_DELAY: Duration = Duration::from_secs(20);

/// One delivery of a queue message
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    /// Processing deadline of this delivery, if the transport imposes one
    pub deadline: Option<Instant>,
}

impl QueueMessage {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// `delay`, capped at the time left before the deadline
    pub fn bounded_delay(&self, delay: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => delay.min(remaining),
            None => delay,
        }
    }
}

/// A subscriber handler
#[async_trait]
pub trait SubService: Send + Sync {
    async fn handle(&self, record: &QueueMessage) -> EventCoreResult<()>;
}

/// Options shared by the subscriber services
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub clock: Arc<dyn Clock>,
    pub marker_failure_policy: MarkerFailurePolicy,
    pub sleep_delay: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            marker_failure_policy: MarkerFailurePolicy::default(),
            sleep_delay: DEFAULT_SLEEP_DELAY,
        }
    }
}

impl ServiceOptions {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_marker_failure_policy(mut self, policy: MarkerFailurePolicy) -> Self {
        self.marker_failure_policy = policy;
        self
    }

    pub fn with_sleep_delay(mut self, delay: Duration) -> Self {
        self.sleep_delay = delay;
        self
    }
}
