//! # Idempotency
//!
//! Best-effort deduplication layered over at-least-once delivery: a durable
//! [`IdempotencyLedger`] of processed identities and the generic [`SingleshotGateway`]
//! that consults it around a per-event-type [`SingleshotHandler`].

pub mod gateway;
pub mod ledger;

pub use gateway::{
    GatewayError, IdentityError, MarkerFailurePolicy, ProcessOutcome, SingleshotGateway,
    SingleshotHandler,
};
pub use ledger::{
    EventIdentity, IdempotencyLedger, LedgerError, LedgerResult, NullLedger, ProcessedMarker,
    StorageLedger, MARKER_KEY_PREFIX,
};
