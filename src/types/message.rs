//! Message types for conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// A single entry in a conversation's history.
///
/// The backend only ever appends to a history; entries the engine has
/// already rendered are never rewritten in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub text: String,
    /// Seconds since the Unix epoch, exactly as the backend stores it.
    #[serde(rename = "ts", default)]
    pub timestamp: i64,
}

impl Message {
    /// Create an incoming (counterpart-authored) message.
    pub fn incoming(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role: Role::Incoming,
            text: text.into(),
            timestamp,
        }
    }

    /// Create an outgoing (bot- or operator-authored) message.
    pub fn outgoing(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role: Role::Outgoing,
            text: text.into(),
            timestamp,
        }
    }

    /// Wall-clock time of the message, `None` when the backend sent 0.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        if self.timestamp <= 0 {
            return None;
        }
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Who authored a message.
///
/// On the wire the backend uses `"user"` for the counterpart and anything
/// else (usually `"assistant"`) for the bot side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[serde(rename = "user")]
    Incoming,
    #[serde(rename = "assistant")]
    Outgoing,
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "incoming" => Role::Incoming,
            _ => Role::Outgoing,
        }
    }
}
