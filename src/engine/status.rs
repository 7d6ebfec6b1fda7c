//! Per-conversation flag cache with optimistic writes.

use std::collections::HashMap;

use crate::types::ConversationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Snapshot,
    /// Local write awaiting confirmation; `generation` identifies it.
    Optimistic { generation: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: bool,
    source: Source,
}

/// Receipt for an optimistic write, used to revert it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticWrite {
    pub id: ConversationId,
    /// Value before the write; `None` if the cache had never seen `id`.
    pub previous: Option<bool>,
    pub value: bool,
    generation: u64,
}

/// Last known "automated responses enabled" flag per conversation.
///
/// An entry is either the last value read from a snapshot or a pending
/// optimistic write that no snapshot has contradicted yet.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: HashMap<ConversationId, Entry>,
    next_generation: u64,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, or `default` when the conversation is unknown.
    pub fn get(&self, id: &ConversationId, default: bool) -> bool {
        self.entries.get(id).map(|e| e.value).unwrap_or(default)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.entries.contains_key(id)
    }

    /// Whether `id` holds a local write not yet confirmed by a snapshot.
    pub fn is_pending(&self, id: &ConversationId) -> bool {
        matches!(
            self.entries.get(id),
            Some(Entry {
                source: Source::Optimistic { .. },
                ..
            })
        )
    }

    /// Apply a value locally before the backend acknowledges it.
    pub fn set_optimistic(&mut self, id: &ConversationId, value: bool) -> OptimisticWrite {
        self.next_generation += 1;
        let generation = self.next_generation;
        let previous = self
            .entries
            .insert(
                id.clone(),
                Entry {
                    value,
                    source: Source::Optimistic { generation },
                },
            )
            .map(|e| e.value);
        OptimisticWrite {
            id: id.clone(),
            previous,
            value,
            generation,
        }
    }

    /// Record a value read from the backend. The backend always wins.
    ///
    /// Returns `true` when the visible value changed.
    pub fn reconcile(&mut self, id: &ConversationId, backend_value: bool) -> bool {
        let changed = self.entries.get(id).map(|e| e.value) != Some(backend_value);
        self.entries.insert(
            id.clone(),
            Entry {
                value: backend_value,
                source: Source::Snapshot,
            },
        );
        changed
    }

    /// Marker to take before fetching a snapshot. Pass it to
    /// [`reconcile_since`](Self::reconcile_since) so writes made while the
    /// fetch was in flight are not overwritten by the older value.
    pub fn watermark(&self) -> u64 {
        self.next_generation
    }

    /// Like [`reconcile`](Self::reconcile), but keeps an optimistic write
    /// issued after `watermark` was taken.
    ///
    /// Returns `true` when the visible value changed.
    pub fn reconcile_since(
        &mut self,
        id: &ConversationId,
        backend_value: bool,
        watermark: u64,
    ) -> bool {
        if let Some(Entry {
            source: Source::Optimistic { generation },
            ..
        }) = self.entries.get(id)
        {
            if *generation > watermark {
                return false;
            }
        }
        self.reconcile(id, backend_value)
    }

    /// Undo a failed optimistic write.
    ///
    /// Only takes effect if `write` is still the current entry; a snapshot or
    /// a newer write that landed in between is kept. Returns whether the
    /// revert applied.
    pub fn revert(&mut self, write: &OptimisticWrite) -> bool {
        let current = self.entries.get(&write.id).map(|e| e.source);
        if current
            != Some(Source::Optimistic {
                generation: write.generation,
            })
        {
            return false;
        }
        match write.previous {
            Some(previous) => {
                self.entries.insert(
                    write.id.clone(),
                    Entry {
                        value: previous,
                        source: Source::Snapshot,
                    },
                );
            }
            None => {
                self.entries.remove(&write.id);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
