//! # Reception
//!
//! Append-only record of one subscriber's successful handling of one message.

use super::message::{format_timestamp, Message};
use crate::storage::{Keyed, StorageKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PARTITION_KEY_ATTRIBUTE: &str = "PK";
pub const SORT_KEY_ATTRIBUTE: &str = "Received";

/// Persisted reception: the message fields plus `PK`, `Received` and `Subscriber`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reception {
    #[serde(flatten)]
    pub message: Message,
    /// `Sent + "/" + Subscriber`
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "Received")]
    pub received: String,
    #[serde(rename = "Subscriber")]
    pub subscriber: String,
}

impl Reception {
    /// Record reception of `message` by `subscriber` now
    pub fn new(subscriber: impl Into<String>, message: Message) -> Self {
        Self::received_at(subscriber, message, Utc::now())
    }

    pub fn received_at(
        subscriber: impl Into<String>,
        message: Message,
        received: DateTime<Utc>,
    ) -> Self {
        let subscriber = subscriber.into();
        let pk = format!("{}/{}", message.sent, subscriber);

        Self {
            message,
            pk,
            received: format_timestamp(received),
            subscriber,
        }
    }
}

impl Keyed for Reception {
    fn storage_key(&self) -> StorageKey {
        StorageKey::partition(PARTITION_KEY_ATTRIBUTE, &self.pk)
            .with_sort(SORT_KEY_ATTRIBUTE, &self.received)
    }
}

impl fmt::Display for Reception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reception:{{Received:{} Subscriber:{} Sent:{} Path:{} Client:{}}}",
            self.received,
            self.subscriber,
            self.message.sent,
            self.message.path,
            self.message.client
        )
    }
}
