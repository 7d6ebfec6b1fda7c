//! CLI entry point for Convosync.

use std::io::{ErrorKind, Stdout, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::render::{RenderInstruction, Renderer, Viewport};

/// Convosync CLI
#[derive(Parser, Debug)]
#[command(name = "convosync", version, about = "Operator console sync client")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to ~/.convosync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend root URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the backend and print render instructions as JSON lines
    Watch(WatchArgs),
    /// Flip the automated-responses flag of a conversation
    Toggle(ConversationArgs),
    /// Send an operator message
    Send(SendArgs),
    /// Delete a conversation's history
    Clear(ConversationArgs),
}

/// Arguments for `convosync watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Conversation to keep open in the message pane
    #[arg(short, long)]
    pub conversation: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Only list conversations whose id or name contains this text
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConversationArgs {
    /// Conversation id
    pub conversation: String,
}

/// Arguments for `convosync send`.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Conversation id
    pub conversation: String,
    /// Message text
    pub text: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve the session config: file, then environment, then flags.
    pub fn load_config(&self) -> Result<SyncConfig> {
        let path = self
            .global
            .config
            .clone()
            .unwrap_or_else(SyncConfig::default_path);
        let mut config = SyncConfig::from_file(&path)?;
        config.apply_env()?;

        if let Some(url) = &self.global.base_url {
            config.base_url = url.clone();
        }
        if let Commands::Watch(WatchArgs {
            interval_ms: Some(ms),
            ..
        }) = &self.command
        {
            config.poll_interval = Duration::from_millis(*ms);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Renderer that writes each instruction as one JSON line.
///
/// A terminal always follows the tail, so the viewport reports itself
/// pinned to the bottom. Once the reader goes away (broken pipe) the
/// renderer stops writing and cancels its token.
#[derive(Debug)]
pub struct JsonLinesRenderer<W = Stdout> {
    out: W,
    closed: CancellationToken,
}

impl JsonLinesRenderer {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl Default for JsonLinesRenderer {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write + Send> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            closed: CancellationToken::new(),
        }
    }

    /// Cancelled when the output can no longer be written.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for JsonLinesRenderer<W> {
    fn apply(&mut self, instruction: &RenderInstruction) {
        if self.closed.is_cancelled() {
            return;
        }
        let line = match serde_json::to_string(instruction) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "could not encode render instruction");
                return;
            }
        };
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            if e.kind() == ErrorKind::BrokenPipe {
                tracing::debug!("output closed, no longer rendering");
                self.closed.cancel();
            } else {
                tracing::debug!(error = %e, "could not write render instruction");
            }
        }
    }

    fn viewport(&self) -> Viewport {
        Viewport::default()
    }
}
