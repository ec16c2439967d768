//! # Data Model
//!
//! The inbound [`Message`] and the [`Reception`] record derived from it.

pub mod message;
pub mod reception;

pub use message::{format_timestamp, Message};
pub use reception::Reception;
