//! Snapshot fetcher trait and implementations.

pub mod console;
pub mod http;

pub use console::HttpFetcher;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{Conversation, ConversationId, Message};

/// Access to the storage collaborator.
///
/// Every read returns a full snapshot; there is no diff or change
/// notification. Reads fail with [`SyncError::Fetch`], writes with
/// [`SyncError::StaleWrite`].
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// All conversations, in the order the backend wants them shown.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, SyncError>;

    /// Full history of one conversation, oldest first.
    async fn get_history(&self, id: &ConversationId) -> Result<Vec<Message>, SyncError>;

    /// Whether automated responses are enabled for one conversation.
    async fn get_flag(&self, id: &ConversationId) -> Result<bool, SyncError>;

    /// Set the automated-responses flag.
    async fn set_flag(&self, id: &ConversationId, enabled: bool) -> Result<(), SyncError>;

    /// Append an operator-authored message.
    async fn append_outbound(&self, id: &ConversationId, text: &str) -> Result<(), SyncError>;

    /// Delete a conversation's stored history.
    async fn clear_history(&self, id: &ConversationId) -> Result<(), SyncError>;
}
