//! Error types for convosync.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::types::ConversationId;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Primary error type for all engine and collaborator operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A snapshot read could not be completed.
    #[error("Fetch failed for {resource}: {message}")]
    Fetch {
        resource: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A flag or message write was not acknowledged by the backend.
    #[error("Write not acknowledged for {conversation}: {message}")]
    StaleWrite {
        conversation: ConversationId,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SyncError {
    /// Create an API error from a non-success status.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a fetch failure without an underlying cause.
    pub fn fetch(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            resource: resource.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a write failure without an underlying cause.
    pub fn stale_write(conversation: &ConversationId, message: impl Into<String>) -> Self {
        Self::StaleWrite {
            conversation: conversation.clone(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a transport-level error as a failed read of `resource`.
    ///
    /// Already-classified `Fetch` and `StaleWrite` errors pass through.
    pub fn into_fetch(self, resource: impl Into<String>) -> Self {
        match self {
            Self::Fetch { .. } | Self::StaleWrite { .. } => self,
            other => Self::Fetch {
                resource: resource.into(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Wrap a transport-level error as an unacknowledged write.
    pub fn into_stale_write(self, conversation: &ConversationId) -> Self {
        match self {
            Self::Fetch { .. } | Self::StaleWrite { .. } => self,
            other => Self::StaleWrite {
                conversation: conversation.clone(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch { .. } => ErrorCategory::Fetch,
            Self::StaleWrite { .. } => ErrorCategory::StaleWrite,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::InvalidArgument(_) | Self::InvalidState(_) => ErrorCategory::Usage,
        }
    }

    /// Whether the next poll tick can be expected to clear this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Fetch
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Fetch
            | ErrorCategory::Network
            | ErrorCategory::Timeout
            | ErrorCategory::Server => RecoverySuggestion::WaitForNextPoll,
            ErrorCategory::StaleWrite => RecoverySuggestion::RetryAction,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Usage => RecoverySuggestion::FixRequest,
            _ => RecoverySuggestion::CheckBackend,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SyncError>;
