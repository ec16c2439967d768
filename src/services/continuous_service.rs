//! # Continuous Service
//!
//! Subscriber that records each distinct message once. Deduplication is delegated to the
//! [`SingleshotGateway`]; [`ReceptionRecorder`] is the per-message work behind it.

use super::{Clock, QueueMessage, ServiceOptions, SubService};
use crate::error::EventCoreResult;
use crate::idempotency::{
    EventIdentity, IdempotencyLedger, IdentityError, NullLedger, ProcessOutcome,
    SingleshotGateway, SingleshotHandler,
};
use crate::models::{Message, Reception};
use crate::storage::{StorageBackend, StorageBackendExt, StorageError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Deduplication identity of a message: `(Client, Sent)`.
///
/// Taken as-is. Empty fields still form an identity, so every message sharing them is
/// deduplicated against the same marker.
pub fn message_identity(message: &Message) -> Result<EventIdentity, IdentityError> {
    Ok(EventIdentity::new(&message.client, &message.sent))
}

/// Writes one [`Reception`] per processed message
pub struct ReceptionRecorder<S: ?Sized> {
    subscriber_id: String,
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: StorageBackend + ?Sized> ReceptionRecorder<S> {
    pub fn new(subscriber_id: impl Into<String>, storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            storage,
            clock,
        }
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }
}

#[async_trait]
impl<S: StorageBackend + ?Sized> SingleshotHandler<Message> for ReceptionRecorder<S> {
    type Error = StorageError;

    fn unique_id(&self, event: &Message) -> Result<EventIdentity, IdentityError> {
        message_identity(event)
    }

    async fn process(&self, event: &Message) -> Result<(), StorageError> {
        let reception =
            Reception::received_at(&self.subscriber_id, event.clone(), self.clock.now());
        info!(reception = %reception, "Process");

        self.storage.put_record(&reception).await.map_err(|e| {
            error!(reception = %reception, error = %e, "Put");
            e
        })
    }
}

/// Deduplicating subscriber
pub struct ContinuousService<S: ?Sized, L: ?Sized> {
    gateway: SingleshotGateway<Message, ReceptionRecorder<S>, L>,
}

impl<S, L> ContinuousService<S, L>
where
    S: StorageBackend + ?Sized,
    L: IdempotencyLedger + ?Sized,
{
    pub fn new(
        subscriber_id: impl Into<String>,
        storage: Arc<S>,
        ledger: Arc<L>,
        options: ServiceOptions,
    ) -> Self {
        let recorder = ReceptionRecorder::new(subscriber_id, storage, options.clock);
        let gateway = SingleshotGateway::new(Arc::new(recorder), ledger)
            .with_marker_failure_policy(options.marker_failure_policy);

        Self { gateway }
    }

    pub fn subscriber_id(&self) -> &str {
        self.gateway.handler().subscriber_id()
    }

    /// Decode and process one message, reporting whether it was processed or skipped
    pub async fn process(&self, record: &QueueMessage) -> EventCoreResult<ProcessOutcome> {
        debug!(message_id = %record.message_id, body = %record.body, "Handle");

        let message = Message::from_json(&record.body).map_err(|e| {
            error!(message_id = %record.message_id, error = %e, "Unmarshal");
            e
        })?;

        Ok(self.gateway.process_once(&message).await?)
    }
}

impl<S: StorageBackend + ?Sized> ContinuousService<S, NullLedger> {
    /// Service whose gateway never suppresses a redelivery
    pub fn without_deduplication(
        subscriber_id: impl Into<String>,
        storage: Arc<S>,
        options: ServiceOptions,
    ) -> Self {
        Self::new(subscriber_id, storage, Arc::new(NullLedger), options)
    }
}

#[async_trait]
impl<S, L> SubService for ContinuousService<S, L>
where
    S: StorageBackend + ?Sized,
    L: IdempotencyLedger + ?Sized,
{
    async fn handle(&self, record: &QueueMessage) -> EventCoreResult<()> {
        let outcome = self.process(record).await?;
        debug!(
            message_id = %record.message_id,
            subscriber_id = %self.subscriber_id(),
            attempted = outcome.attempted(),
            "Handled"
        );
        Ok(())
    }
}
