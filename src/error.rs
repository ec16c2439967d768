//! # Handler Errors
//!
//! One variant per failure kind a subscriber invocation can end with. Every kind except
//! `FatalFault` is an ordinary failed invocation: the message is not acknowledged and the
//! external queue redelivers it. `FatalFault` asks the supervising layer to stop the instance.

use crate::idempotency::{GatewayError, IdentityError, LedgerError};
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventCoreError {
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    IdentityDerivation(#[from] IdentityError),

    #[error("Ledger read error: {0}")]
    LedgerRead(#[source] LedgerError),

    #[error("Processing error: {0}")]
    Processing(#[source] StorageError),

    #[error("Marker write error: {0}")]
    MarkerWrite(#[source] LedgerError),

    #[error("Suspended")]
    Suspended { path: String },

    #[error("Command error: {path}")]
    Command { path: String },

    #[error("Fatal fault: {path}")]
    FatalFault { path: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EventCoreError {
    /// True when the hosting instance must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalFault { .. })
    }

    /// Short machine-readable kind, used in logs and batch reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::IdentityDerivation(_) => "identity_derivation",
            Self::LedgerRead(_) => "ledger_read",
            Self::Processing(_) => "processing",
            Self::MarkerWrite(_) => "marker_write",
            Self::Suspended { .. } => "suspended",
            Self::Command { .. } => "command",
            Self::FatalFault { .. } => "fatal_fault",
            Self::Storage(_) => "storage",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<GatewayError<StorageError>> for EventCoreError {
    fn from(err: GatewayError<StorageError>) -> Self {
        match err {
            GatewayError::Identity(e) => EventCoreError::IdentityDerivation(e),
            GatewayError::LedgerRead(e) => EventCoreError::LedgerRead(e),
            GatewayError::Processing(e) => EventCoreError::Processing(e),
            GatewayError::MarkerWrite(e) => EventCoreError::MarkerWrite(e),
        }
    }
}

pub type EventCoreResult<T> = Result<T, EventCoreError>;
