//! Render instructions and the renderer seam.
//!
//! The engine never touches a display. It produces [`RenderInstruction`]s and
//! hands them to a [`Renderer`], which also reports the message pane's scroll
//! geometry so the engine can decide whether to follow new messages.

use serde::Serialize;

use crate::types::{ConversationId, Message};

/// One display mutation produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderInstruction {
    /// Drop every list row.
    ClearList,
    /// Append a list row.
    ListRow {
        id: ConversationId,
        label: String,
        preview: String,
        enabled: bool,
        active: bool,
    },
    /// Move the active-row highlight (`None` clears it).
    MarkActiveRow { id: Option<ConversationId> },
    /// Update the flag badge of one row and, if active, the header.
    SetStatus { id: ConversationId, enabled: bool },
    /// Drop every rendered message.
    ClearMessages,
    /// Append one message to the message pane.
    AppendMessage(Message),
    /// Show the "no history yet" placeholder.
    ShowEmptyHistory,
    /// Scroll the message pane to its last entry.
    ScrollToBottom,
    /// Show a failure in the status area.
    ShowError { message: String },
    /// Clear the status area.
    ClearError,
}

/// Scroll geometry of the message pane, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }

    pub fn is_near_bottom(&self, threshold_px: f64) -> bool {
        self.distance_from_bottom() <= threshold_px
    }
}

/// Display surface driven by the engine.
pub trait Renderer: Send {
    /// Apply one instruction.
    fn apply(&mut self, instruction: &RenderInstruction);

    /// Current scroll geometry of the message pane.
    fn viewport(&self) -> Viewport;

    fn apply_all(&mut self, instructions: &[RenderInstruction]) {
        for instruction in instructions {
            self.apply(instruction);
        }
    }
}

/// Headless renderer that records every instruction and models a viewport.
///
/// Each message is treated as `line_height` pixels tall, so appends grow the
/// scroll height and [`RenderInstruction::ScrollToBottom`] pins the view.
#[derive(Debug, Clone)]
pub struct RecordingRenderer {
    pub instructions: Vec<RenderInstruction>,
    rows: Vec<ConversationId>,
    messages: Vec<Message>,
    viewport: Viewport,
    line_height: f64,
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new(400.0, 20.0)
    }
}

impl RecordingRenderer {
    pub fn new(client_height: f64, line_height: f64) -> Self {
        Self {
            instructions: Vec::new(),
            rows: Vec::new(),
            messages: Vec::new(),
            viewport: Viewport {
                scroll_height: client_height,
                scroll_top: 0.0,
                client_height,
            },
            line_height,
        }
    }

    /// Instructions recorded since the last call.
    pub fn take(&mut self) -> Vec<RenderInstruction> {
        std::mem::take(&mut self.instructions)
    }

    /// Row ids currently materialized in the list.
    pub fn rows(&self) -> &[ConversationId] {
        &self.rows
    }

    /// Messages currently materialized in the pane.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Simulate the viewer scrolling to `scroll_top`.
    pub fn scroll_to(&mut self, scroll_top: f64) {
        let max = (self.viewport.scroll_height - self.viewport.client_height).max(0.0);
        self.viewport.scroll_top = scroll_top.clamp(0.0, max);
    }

    fn relayout(&mut self) {
        let content = self.messages.len() as f64 * self.line_height;
        self.viewport.scroll_height = content.max(self.viewport.client_height);
        let max = self.viewport.scroll_height - self.viewport.client_height;
        self.viewport.scroll_top = self.viewport.scroll_top.min(max);
    }
}

impl Renderer for RecordingRenderer {
    fn apply(&mut self, instruction: &RenderInstruction) {
        match instruction {
            RenderInstruction::ClearList => self.rows.clear(),
            RenderInstruction::ListRow { id, .. } => self.rows.push(id.clone()),
            RenderInstruction::ClearMessages => {
                self.messages.clear();
                self.viewport.scroll_top = 0.0;
                self.relayout();
            }
            RenderInstruction::AppendMessage(message) => {
                self.messages.push(message.clone());
                self.relayout();
            }
            RenderInstruction::ScrollToBottom => {
                self.viewport.scroll_top =
                    self.viewport.scroll_height - self.viewport.client_height;
            }
            _ => {}
        }
        self.instructions.push(instruction.clone());
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}
