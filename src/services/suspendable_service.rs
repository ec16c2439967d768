//! # Suspendable Service
//!
//! Subscriber driven by commands embedded in the message path. Every delivery, redeliveries
//! included, runs the interpreter and appends a new reception; there is no deduplication.
//!
//! Flow per message:
//!
//! 1. decode the body
//! 2. read the [`SuspendFlag`]
//! 3. while suspended, reject anything whose path lacks `"resume"`
//! 4. interpret the path command (see [`SubscriberCommand::parse`])
//! 5. put a [`Reception`]
//!
//! The flag is read and written without compare-and-set, so a concurrent `suspend` and
//! `resume` may leave either state behind.

use super::{QueueMessage, ServiceOptions, SubService};
use crate::error::{EventCoreError, EventCoreResult};
use crate::models::{Message, Reception};
use crate::state_machine::{SubscriberCommand, SubscriberState, SuspendFlag};
use crate::storage::{StorageBackend, StorageBackendExt};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct SuspendableService<S: ?Sized, F: ?Sized> {
    subscriber_id: String,
    storage: Arc<S>,
    suspend_flag: Arc<F>,
    options: ServiceOptions,
}

impl<S, F> SuspendableService<S, F>
where
    S: StorageBackend + ?Sized,
    F: SuspendFlag + ?Sized,
{
    pub fn new(
        subscriber_id: impl Into<String>,
        storage: Arc<S>,
        suspend_flag: Arc<F>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            storage,
            suspend_flag,
            options,
        }
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn suspend_flag(&self) -> &F {
        &self.suspend_flag
    }

    /// Current state as seen through the flag
    pub async fn state(&self) -> EventCoreResult<SubscriberState> {
        Ok(self.suspend_flag.state().await?)
    }

    /// Run the command embedded in `message`'s path. Returns the command on success so the
    /// caller can go on to record the reception.
    async fn state_change(
        &self,
        message: &Message,
        record: &QueueMessage,
    ) -> EventCoreResult<SubscriberCommand> {
        let command = SubscriberCommand::parse(&message.path);
        let path = &message.path;

        match command {
            SubscriberCommand::Suspend => warn!(path = %path, "DO SUSPEND"),
            SubscriberCommand::Resume => warn!(path = %path, "DO RESUME"),
            SubscriberCommand::Sleep => {
                let delay = record.bounded_delay(self.options.sleep_delay);
                warn!(path = %path, delay_ms = delay.as_millis() as u64, "DO SLEEP");
                tokio::time::sleep(delay).await;
            }
            SubscriberCommand::Error => {
                warn!(path = %path, "DO ERROR");
                return Err(EventCoreError::Command { path: path.clone() });
            }
            SubscriberCommand::Panic => {
                warn!(path = %path, "DO PANIC");
                return Err(EventCoreError::FatalFault { path: path.clone() });
            }
            SubscriberCommand::Ok => warn!(path = %path, "DO OK"),
        }

        if let Some(target) = SubscriberState::target_of(command) {
            self.suspend_flag
                .set_suspended(target.is_suspended())
                .await?;
        }

        Ok(command)
    }
}

#[async_trait]
impl<S, F> SubService for SuspendableService<S, F>
where
    S: StorageBackend + ?Sized,
    F: SuspendFlag + ?Sized,
{
    async fn handle(&self, record: &QueueMessage) -> EventCoreResult<()> {
        debug!(message_id = %record.message_id, body = %record.body, "Handle");

        let message = Message::from_json(&record.body).map_err(|e| {
            error!(message_id = %record.message_id, error = %e, "Unmarshal");
            e
        })?;

        let state = self.suspend_flag.state().await?;
        if !state.admits(&message.path) {
            warn!(message = %message, "SUSPENDED");
            return Err(EventCoreError::Suspended { path: message.path });
        }

        let command = self.state_change(&message, record).await?;
        debug!(command = command.command_type(), "Command applied");

        let reception =
            Reception::received_at(&self.subscriber_id, message, self.options.clock.now());
        info!(reception = %reception, "Receive");

        self.storage.put_record(&reception).await.map_err(|e| {
            error!(reception = %reception, error = %e, "Put");
            EventCoreError::Storage(e)
        })
    }
}
