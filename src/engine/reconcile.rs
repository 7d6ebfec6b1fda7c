//! Identity-based reconciliation of the conversation list.

use crate::render::RenderInstruction;
use crate::types::{Conversation, ConversationId};

use super::status::StatusCache;

/// Separator between ids so `["ab", "c"]` and `["a", "bc"]` differ.
const ID_SEPARATOR: char = '\u{1f}';

/// Order-sensitive identity of a list snapshot.
///
/// A reorder with the same members yields a different fingerprint, since
/// order reflects recency. The empty list fingerprints to `""`.
pub fn fingerprint(snapshot: &[Conversation]) -> String {
    let mut out = String::new();
    for (i, conversation) in snapshot.iter().enumerate() {
        if i > 0 {
            out.push(ID_SEPARATOR);
        }
        out.push_str(conversation.id.as_str());
    }
    out
}

/// What a fresh list snapshot requires.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPlan {
    /// Membership and order unchanged: only move the active highlight.
    Patch(Vec<RenderInstruction>),
    /// Fetch every flag and rebuild all rows.
    Rebuild { fingerprint: String },
}

/// Decide between a cosmetic patch and a full rebuild.
///
/// `previous` is `None` until the first rebuild commits, so even an empty
/// first snapshot rebuilds once.
pub fn plan_list(
    previous: Option<&str>,
    snapshot: &[Conversation],
    active: Option<&ConversationId>,
) -> ListPlan {
    let next = fingerprint(snapshot);
    if previous == Some(next.as_str()) {
        let id = active
            .filter(|id| snapshot.iter().any(|c| &c.id == *id))
            .cloned();
        ListPlan::Patch(vec![RenderInstruction::MarkActiveRow { id }])
    } else {
        ListPlan::Rebuild { fingerprint: next }
    }
}

/// Materialize list rows from scratch.
///
/// Flags come from `cache`, which the caller has just reconciled against the
/// backend. Rows not matching `filter` are skipped.
pub fn build_rows(
    snapshot: &[Conversation],
    cache: &StatusCache,
    active: Option<&ConversationId>,
    filter: &str,
    default_enabled: bool,
) -> Vec<RenderInstruction> {
    let mut rows = Vec::with_capacity(snapshot.len() + 1);
    rows.push(RenderInstruction::ClearList);
    rows.extend(
        snapshot
            .iter()
            .filter(|c| c.matches(filter))
            .map(|c| RenderInstruction::ListRow {
                id: c.id.clone(),
                label: c.label().to_string(),
                preview: c.last_preview.clone(),
                enabled: cache.get(&c.id, default_enabled),
                active: active == Some(&c.id),
            }),
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list(ids: &[&str]) -> Vec<Conversation> {
        ids.iter().map(|id| Conversation::new(*id, true)).collect()
    }

    #[test]
    fn fingerprint_is_order_sensitive_and_unambiguous() {
        assert_ne!(fingerprint(&list(&["a", "b"])), fingerprint(&list(&["b", "a"])));
        assert_ne!(fingerprint(&list(&["ab", "c"])), fingerprint(&list(&["a", "bc"])));
        assert_eq!(fingerprint(&[]), "");
    }

    #[test]
    fn first_empty_snapshot_rebuilds_once() {
        assert_eq!(
            plan_list(None, &[], None),
            ListPlan::Rebuild {
                fingerprint: String::new()
            }
        );
        assert_eq!(
            plan_list(Some(""), &[], None),
            ListPlan::Patch(vec![RenderInstruction::MarkActiveRow { id: None }])
        );
    }

    #[test]
    fn unchanged_snapshot_only_marks_active_row() {
        let snapshot = list(&["a", "b"]);
        let fp = fingerprint(&snapshot);
        let active = ConversationId::new("b");
        assert_eq!(
            plan_list(Some(&fp), &snapshot, Some(&active)),
            ListPlan::Patch(vec![RenderInstruction::MarkActiveRow {
                id: Some(active.clone())
            }])
        );
    }

    #[test]
    fn active_row_absent_from_snapshot_is_not_highlighted() {
        let snapshot = list(&["a"]);
        let fp = fingerprint(&snapshot);
        let gone = ConversationId::new("z");
        assert_eq!(
            plan_list(Some(&fp), &snapshot, Some(&gone)),
            ListPlan::Patch(vec![RenderInstruction::MarkActiveRow { id: None }])
        );
    }

    #[test]
    fn rows_use_cache_and_filter() {
        let snapshot = list(&["5511", "5521"]);
        let mut cache = StatusCache::new();
        cache.reconcile(&ConversationId::new("5511"), false);
        let active = ConversationId::new("5511");

        let rows = build_rows(&snapshot, &cache, Some(&active), "551", true);
        assert_eq!(
            rows,
            vec![
                RenderInstruction::ClearList,
                RenderInstruction::ListRow {
                    id: ConversationId::new("5511"),
                    label: "5511".into(),
                    preview: String::new(),
                    enabled: false,
                    active: true,
                },
            ]
        );
    }
}
