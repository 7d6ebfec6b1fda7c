//! Append-only merge of a conversation's history into the message pane.

use crate::render::RenderInstruction;
use crate::types::Message;

/// How far a conversation's history has been materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderCursor {
    /// Number of history entries already on screen.
    pub count: usize,
    /// Last entry on screen, used to detect a history that was cleared and
    /// regrew past `count` between two polls.
    pub last: Option<Message>,
}

impl RenderCursor {
    fn covering(history: &[Message]) -> Self {
        Self {
            count: history.len(),
            last: history.last().cloned(),
        }
    }

    /// Whether `history` still starts with what this cursor rendered.
    fn is_prefix_of(&self, history: &[Message]) -> bool {
        if self.count > history.len() {
            return false;
        }
        match (self.count, &self.last) {
            (0, _) => true,
            (n, Some(last)) => &history[n - 1] == last,
            (_, None) => true,
        }
    }
}

/// What a merge did to the message pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Nothing new.
    Unchanged,
    /// Only the new tail was appended.
    Appended(usize),
    /// The pane was cleared and the full history rendered.
    Rerendered(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub cursor: RenderCursor,
    pub kind: MergeKind,
    pub instructions: Vec<RenderInstruction>,
}

/// Merge a freshly fetched `history` against what is already on screen.
///
/// `switched` means the active conversation just changed, which always
/// forces a full render and a jump to the latest message. Otherwise only
/// `history[cursor.count..]` is appended, unless the history shrank or its
/// rendered prefix no longer matches, in which case the pane is rebuilt.
/// The pane follows new messages only if `was_near_bottom`.
pub fn merge_history(
    cursor: &RenderCursor,
    history: &[Message],
    switched: bool,
    was_near_bottom: bool,
) -> MergeOutcome {
    let mut instructions = Vec::new();

    let kind = if switched || !cursor.is_prefix_of(history) {
        instructions.push(RenderInstruction::ClearMessages);
        if history.is_empty() {
            instructions.push(RenderInstruction::ShowEmptyHistory);
        } else {
            instructions.extend(history.iter().cloned().map(RenderInstruction::AppendMessage));
        }
        MergeKind::Rerendered(history.len())
    } else if history.len() == cursor.count {
        MergeKind::Unchanged
    } else {
        let tail = &history[cursor.count..];
        if cursor.count == 0 {
            // Replaces the empty-history placeholder.
            instructions.push(RenderInstruction::ClearMessages);
        }
        instructions.extend(tail.iter().cloned().map(RenderInstruction::AppendMessage));
        MergeKind::Appended(tail.len())
    };

    if kind != MergeKind::Unchanged && (switched || was_near_bottom) {
        instructions.push(RenderInstruction::ScrollToBottom);
    }

    MergeOutcome {
        cursor: RenderCursor::covering(history),
        kind,
        instructions,
    }
}
