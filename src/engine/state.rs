//! Process-local engine state.

use std::collections::HashMap;

use crate::types::{Conversation, ConversationId};

use super::merge::RenderCursor;
use super::status::StatusCache;

/// Everything the engine remembers between cycles. Rebuilt on every start.
#[derive(Debug, Default)]
pub struct EngineState {
    pub(crate) active: Option<ConversationId>,
    /// Bumped on every selection change; results tagged with an older epoch
    /// are discarded.
    pub(crate) selection_epoch: u64,
    /// The active conversation has not been fully rendered since selection.
    pub(crate) switch_pending: bool,
    pub(crate) cursors: HashMap<ConversationId, RenderCursor>,
    pub(crate) status: StatusCache,
    /// `None` until the first rebuild commits.
    pub(crate) list_fingerprint: Option<String>,
    pub(crate) snapshot: Vec<Conversation>,
    pub(crate) filter: String,
    /// Sequence of the last history request issued / committed.
    pub(crate) history_issued: u64,
    pub(crate) history_committed: u64,
    pub(crate) last_error: Option<String>,
}

/// Identifies which history request a result belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HistoryTicket {
    pub id: ConversationId,
    pub epoch: u64,
    pub seq: u64,
}

impl EngineState {
    pub(crate) fn issue_history_ticket(&mut self) -> Option<HistoryTicket> {
        let id = self.active.clone()?;
        self.history_issued += 1;
        Some(HistoryTicket {
            id,
            epoch: self.selection_epoch,
            seq: self.history_issued,
        })
    }

    /// Whether a result for `ticket` may still be applied.
    pub(crate) fn is_current(&self, ticket: &HistoryTicket) -> bool {
        self.selection_epoch == ticket.epoch
            && self.active.as_ref() == Some(&ticket.id)
            && ticket.seq > self.history_committed
    }

    pub(crate) fn select(&mut self, id: Option<ConversationId>) {
        self.active = id;
        self.selection_epoch += 1;
        self.switch_pending = self.active.is_some();
    }

    pub(crate) fn rendered_count(&self, id: &ConversationId) -> usize {
        self.cursors.get(id).map(|c| c.count).unwrap_or(0)
    }
}
