//! Convenience re-exports for common use.

pub use crate::config::SyncConfig;
pub use crate::engine::{CycleOutcome, CycleStage, EnginePhase, SyncEngine};
pub use crate::error::{Result, SyncError};
pub use crate::fetcher::SnapshotFetcher;
pub use crate::fetcher::HttpFetcher;
pub use crate::render::{RecordingRenderer, RenderInstruction, Renderer, Viewport};
pub use crate::scheduler::{PollHandle, PollScheduler, PollStats};
pub use crate::types::{Conversation, ConversationId, Message, Role};
