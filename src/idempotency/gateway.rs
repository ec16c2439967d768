//! # Singleshot Gateway
//!
//! Generic "check, process, mark" orchestration. The gateway is parameterised by a
//! [`SingleshotHandler`] (identity derivation plus the side-effecting work) and an
//! [`IdempotencyLedger`], and instantiated per event type.
//!
//! The gateway fails closed: if the ledger cannot be read, nothing is processed and the error
//! is returned so the queue redelivers. A failure to write the marker after successful
//! processing is governed by [`MarkerFailurePolicy`]; under the default `Swallow` policy the
//! event is reported as processed and will be processed again if it is redelivered.

use super::ledger::{EventIdentity, IdempotencyLedger, LedgerError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Identity could not be derived from an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Identity derivation failed: {message}")]
pub struct IdentityError {
    pub message: String,
}

impl IdentityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-event-type delegate of the gateway
#[async_trait]
pub trait SingleshotHandler<T>: Send + Sync
where
    T: Send + Sync,
{
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deterministically derive the deduplication identity of `event`
    fn unique_id(&self, event: &T) -> Result<EventIdentity, IdentityError>;

    /// Perform the side-effecting work for `event`
    async fn process(&self, event: &T) -> Result<(), Self::Error>;
}

/// What to do when the marker write fails after successful processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerFailurePolicy {
    /// Log and report success; a redelivery will be processed again
    #[default]
    Swallow,
    /// Return `GatewayError::MarkerWrite`; the queue redelivers and the ledger suppresses nothing
    Propagate,
}

/// Successful outcome of [`SingleshotGateway::process_once`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The delegate processed the event
    Processed,
    /// A marker already existed; the event was skipped
    AlreadyProcessed,
}

impl ProcessOutcome {
    /// Whether the delegate's `process` was invoked
    pub fn attempted(&self) -> bool {
        matches!(self, Self::Processed)
    }
}

/// Gateway errors, generic over the delegate's processing error
#[derive(Error, Debug)]
pub enum GatewayError<E> {
    #[error(transparent)]
    Identity(IdentityError),

    #[error("Checking if event has been processed failed: {0}")]
    LedgerRead(#[source] LedgerError),

    #[error("Processing failed: {0}")]
    Processing(E),

    #[error("Marking event as processed failed: {0}")]
    MarkerWrite(#[source] LedgerError),
}

impl<E> GatewayError<E> {
    /// Whether the delegate's `process` was invoked before the failure
    pub fn attempted(&self) -> bool {
        matches!(self, Self::Processing(_) | Self::MarkerWrite(_))
    }
}

/// Process-exactly-once-if-possible gateway
pub struct SingleshotGateway<T, H: ?Sized, L: ?Sized> {
    handler: Arc<H>,
    ledger: Arc<L>,
    marker_failure_policy: MarkerFailurePolicy,
    _event: PhantomData<fn(&T)>,
}

impl<T, H, L> SingleshotGateway<T, H, L>
where
    T: Debug + Send + Sync,
    H: SingleshotHandler<T> + ?Sized,
    L: IdempotencyLedger + ?Sized,
{
    pub fn new(handler: Arc<H>, ledger: Arc<L>) -> Self {
        Self {
            handler,
            ledger,
            marker_failure_policy: MarkerFailurePolicy::default(),
            _event: PhantomData,
        }
    }

    pub fn with_marker_failure_policy(mut self, policy: MarkerFailurePolicy) -> Self {
        self.marker_failure_policy = policy;
        self
    }

    pub fn marker_failure_policy(&self) -> MarkerFailurePolicy {
        self.marker_failure_policy
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Process `event` unless the ledger says it already has been.
    ///
    /// Side effects per call: at most one ledger read, at most one `process`, at most one
    /// marker write.
    pub async fn process_once(
        &self,
        event: &T,
    ) -> Result<ProcessOutcome, GatewayError<H::Error>> {
        debug!(event = ?event, "ProcessOnce");

        let identity = self.handler.unique_id(event).map_err(|e| {
            error!(error = %e, "Error getting unique id");
            GatewayError::Identity(e)
        })?;

        let already_processed = self
            .ledger
            .has_been_processed(&identity)
            .await
            .map_err(|e| {
                error!(
                    identity = %identity,
                    error = %e,
                    "Error checking if event has been processed"
                );
                GatewayError::LedgerRead(e)
            })?;

        if already_processed {
            info!(identity = %identity, "Event has already been processed");
            return Ok(ProcessOutcome::AlreadyProcessed);
        }

        if let Err(e) = self.handler.process(event).await {
            error!(identity = %identity, error = %e, "Process error");
            return Err(GatewayError::Processing(e));
        }

        if let Err(e) = self.ledger.mark_processed(&identity).await {
            error!(identity = %identity, error = %e, "Error marking event as processed");

            match self.marker_failure_policy {
                MarkerFailurePolicy::Swallow => {
                    warn!(
                        identity = %identity,
                        "Marker not persisted, a redelivery will be reprocessed"
                    );
                }
                MarkerFailurePolicy::Propagate => return Err(GatewayError::MarkerWrite(e)),
            }
        }

        Ok(ProcessOutcome::Processed)
    }
}
