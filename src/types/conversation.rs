//! Conversation summaries as returned by the list endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque conversation identifier (a phone-like handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One row of the conversation list snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    #[serde(rename = "numero")]
    pub id: ConversationId,
    /// Whether automated responses are active for this conversation.
    #[serde(rename = "ai_enabled", default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub last_preview: String,
    /// Seconds since the Unix epoch of the latest message, 0 when unknown.
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl Conversation {
    pub fn new(id: impl Into<ConversationId>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            enabled,
            last_preview: String::new(),
            updated_at: 0,
            display_name: None,
        }
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.last_preview = preview.into();
        self
    }

    /// Name to show in the list: the contact name when known, else the id.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.id.as_str(),
        }
    }

    /// Case-insensitive match of `query` against the id and display name.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.id.as_str().to_lowercase().contains(&needle)
            || self
                .display_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_snapshot_fields() {
        let raw = r#"{
            "numero": "5511999990000",
            "contact_name": "",
            "display_name": "Maria",
            "ai_enabled": false,
            "updated_at": 1700000000,
            "last_preview": "ok"
        }"#;
        let conversation: Conversation = serde_json::from_str(raw).unwrap();
        assert_eq!(conversation.id.as_str(), "5511999990000");
        assert!(!conversation.enabled);
        assert_eq!(conversation.label(), "Maria");
    }

    #[test]
    fn missing_flag_means_enabled() {
        let conversation: Conversation = serde_json::from_str(r#"{"numero": "1"}"#).unwrap();
        assert!(conversation.enabled);
        assert_eq!(conversation.label(), "1");
    }

    #[test]
    fn matches_id_or_name() {
        let mut conversation = Conversation::new("5511", true);
        conversation.display_name = Some("Maria Silva".into());
        assert!(conversation.matches("551"));
        assert!(conversation.matches("silva"));
        assert!(conversation.matches("  "));
        assert!(!conversation.matches("joão"));
    }
}
