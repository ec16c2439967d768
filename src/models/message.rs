//! # Message
//!
//! The immutable inbound event. Created once at publish time and carried as the JSON body of
//! a queue message: `{"Sent": .., "Path": .., "Client": ..}`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inbound event published by a client
///
/// Missing fields decode as empty strings; only malformed JSON is a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Message {
    /// Publish instant, RFC3339 with nanosecond precision
    pub sent: String,
    /// Command / route string
    pub path: String,
    /// Originator identifier
    pub client: String,
}

impl Message {
    /// Create a message stamped with the current instant
    pub fn new(client: impl Into<String>, path: impl Into<String>) -> Self {
        Self::sent_at(client, path, Utc::now())
    }

    /// Create a message stamped with the given instant
    pub fn sent_at(
        client: impl Into<String>,
        path: impl Into<String>,
        sent: DateTime<Utc>,
    ) -> Self {
        Self {
            sent: format_timestamp(sent),
            path: path.into(),
            client: client.into(),
        }
    }

    /// Decode a queue message body
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message:{{Sent:{} Path:{} Client:{}}}",
            self.sent, self.path, self.client
        )
    }
}

/// Render an instant as RFC3339 with up to nanosecond precision and a `Z` suffix.
///
/// Trailing zeros of the fraction are dropped, and so is the fraction itself when it is zero:
/// `2025-01-01T00:00:01Z`, `2025-01-01T00:00:01.5Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let rendered = at.to_rfc3339_opts(SecondsFormat::Nanos, true);

    match rendered.strip_suffix('Z').and_then(|s| s.rsplit_once('.')) {
        Some((seconds, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{seconds}Z")
            } else {
                format!("{seconds}.{fraction}Z")
            }
        }
        None => rendered,
    }
}
