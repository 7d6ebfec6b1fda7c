//! Convosync: incremental sync for a messaging operator console.
//!
//! Keeps a conversation list and a message pane consistent with a backend
//! that only serves full snapshots. Each poll cycle fetches the list and the
//! active conversation's history, diffs them against what is already on
//! screen and emits the minimal set of [`render::RenderInstruction`]s.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use convosync::prelude::*;
//!
//! # async fn example() -> convosync::error::Result<()> {
//! let config = SyncConfig::load()?;
//! let fetcher = Arc::new(HttpFetcher::new(&config)?);
//! let engine = SyncEngine::new(config, fetcher, RecordingRenderer::default());
//!
//! engine.select(&ConversationId::new("5511999990000")).await?;
//! let handle = PollScheduler::new(engine).start()?;
//! // ...
//! let stats = handle.stop().await;
//! println!("{} cycles, {} dropped ticks", stats.completed, stats.dropped);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod prelude;
pub mod render;
pub mod scheduler;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
