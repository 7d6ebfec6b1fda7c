//! Incremental sync engine over full-snapshot polling.
//!
//! One [`SyncEngine`] per session owns all state: the active conversation,
//! the per-conversation render cursors, the flag cache and the list
//! fingerprint. A poll cycle ([`SyncEngine::poll_cycle`]) and the user
//! actions ([`SyncEngine::select`], [`SyncEngine::toggle`],
//! [`SyncEngine::send`], [`SyncEngine::clear`]) all go through it.
//!
//! State is held behind a mutex that is never held across an await; each
//! step commits only after its fetch succeeds.

pub mod merge;
pub mod reconcile;
pub mod state;
pub mod status;

pub use merge::{merge_history, MergeKind, MergeOutcome, RenderCursor};
pub use reconcile::{build_rows, fingerprint, plan_list, ListPlan};
pub use state::EngineState;
pub use status::{OptimisticWrite, StatusCache};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::try_join_all;
use strum::Display;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::fetcher::SnapshotFetcher;
use crate::render::{RenderInstruction, Renderer};
use crate::types::{ConversationId, Message};
use crate::util::timeout::with_timeout;

use state::HistoryTicket;

/// Whether a poll cycle is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Running,
}

/// Step of a poll cycle, reported with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CycleStage {
    List,
    Flags,
    History,
    /// The cycle exceeded the configured cycle timeout.
    Deadline,
}

/// A failed cycle step. Nothing from the failed step was committed.
#[derive(Debug)]
pub struct CycleFailure {
    pub stage: CycleStage,
    pub error: SyncError,
}

impl From<SyncError> for CycleFailure {
    fn from(error: SyncError) -> Self {
        Self {
            stage: CycleStage::Deadline,
            error,
        }
    }
}

fn at(stage: CycleStage) -> impl FnOnce(SyncError) -> CycleFailure {
    move |error| CycleFailure { stage, error }
}

/// Effect of a cycle on the conversation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// Fingerprint unchanged; only the active highlight was patched.
    Patched,
    /// Every row was rebuilt; `rows` is the number of visible rows.
    Rebuilt { rows: usize },
}

/// Effect of a history refresh on the message pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryChange {
    Merged(MergeKind),
    /// The result arrived for a selection that is no longer current.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub list: ListChange,
    /// `None` when no conversation is active.
    pub history: Option<HistoryChange>,
}

/// Result of one poll attempt.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Another cycle held the guard; this tick was dropped.
    Skipped,
    Completed(CycleSummary),
    Failed(CycleFailure),
}

impl CycleOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn summary(&self) -> Option<&CycleSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Exclusive right to run one poll cycle.
#[derive(Debug)]
pub struct CyclePermit(OwnedSemaphorePermit);

struct Inner<R> {
    session_id: Uuid,
    config: SyncConfig,
    fetcher: Arc<dyn SnapshotFetcher>,
    renderer: Mutex<R>,
    state: Mutex<EngineState>,
    cycle_guard: Arc<Semaphore>,
    cycles: AtomicU64,
    phase_tx: watch::Sender<EnginePhase>,
}

/// Shared handle to one sync session. Cloning is cheap.
pub struct SyncEngine<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for SyncEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Sets the phase to `Running` for as long as it lives.
struct PhaseGuard<'a>(&'a watch::Sender<EnginePhase>);

impl<'a> PhaseGuard<'a> {
    fn enter(tx: &'a watch::Sender<EnginePhase>) -> Self {
        tx.send_replace(EnginePhase::Running);
        Self(tx)
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(EnginePhase::Idle);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<R: Renderer + 'static> SyncEngine<R> {
    pub fn new(config: SyncConfig, fetcher: Arc<dyn SnapshotFetcher>, renderer: R) -> Self {
        let (phase_tx, _) = watch::channel(EnginePhase::Idle);
        Self {
            inner: Arc::new(Inner {
                session_id: Uuid::new_v4(),
                config,
                fetcher,
                renderer: Mutex::new(renderer),
                state: Mutex::new(EngineState::default()),
                cycle_guard: Arc::new(Semaphore::new(1)),
                cycles: AtomicU64::new(0),
                phase_tx,
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    /// Run `f` against the renderer.
    pub fn with_renderer<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut lock(&self.inner.renderer))
    }

    pub fn phase(&self) -> EnginePhase {
        *self.inner.phase_tx.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<EnginePhase> {
        self.inner.phase_tx.subscribe()
    }

    pub fn is_cycle_in_flight(&self) -> bool {
        self.inner.cycle_guard.available_permits() == 0
    }

    pub fn active(&self) -> Option<ConversationId> {
        lock(&self.inner.state).active.clone()
    }

    pub fn list_fingerprint(&self) -> Option<String> {
        lock(&self.inner.state).list_fingerprint.clone()
    }

    /// Number of history entries of `id` currently materialized.
    pub fn rendered_count(&self, id: &ConversationId) -> usize {
        lock(&self.inner.state).rendered_count(id)
    }

    /// Flag as the viewer sees it, falling back to the configured default.
    pub fn flag(&self, id: &ConversationId) -> bool {
        lock(&self.inner.state)
            .status
            .get(id, self.inner.config.default_enabled)
    }

    pub fn is_flag_pending(&self, id: &ConversationId) -> bool {
        lock(&self.inner.state).status.is_pending(id)
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.state).last_error.clone()
    }

    // -- Poll cycle --

    /// Take the cycle guard if it is free.
    pub fn try_begin_cycle(&self) -> Option<CyclePermit> {
        Arc::clone(&self.inner.cycle_guard)
            .try_acquire_owned()
            .ok()
            .map(CyclePermit)
    }

    /// Wait until no cycle is in flight.
    pub async fn wait_for_idle(&self) {
        if let Ok(permit) = self.inner.cycle_guard.acquire().await {
            drop(permit);
        }
    }

    /// Run one poll cycle, or return [`CycleOutcome::Skipped`] if one is
    /// already in flight.
    pub async fn poll_cycle(&self) -> CycleOutcome {
        match self.try_begin_cycle() {
            Some(permit) => self.run_cycle(permit).await,
            None => {
                debug!(session = %self.inner.session_id, "cycle already in flight; dropping tick");
                CycleOutcome::Skipped
            }
        }
    }

    /// Run a cycle under an already acquired permit. The permit is released
    /// when the cycle ends, whatever the outcome.
    pub async fn run_cycle(&self, permit: CyclePermit) -> CycleOutcome {
        let cycle = self.inner.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("poll_cycle", session = %self.inner.session_id, cycle);

        let result = async {
            let _phase = PhaseGuard::enter(&self.inner.phase_tx);
            with_timeout(self.inner.config.cycle_timeout, self.cycle_steps()).await
        }
        .instrument(span)
        .await;
        drop(permit);

        match result {
            Ok(summary) => {
                self.clear_surfaced_error();
                debug!(cycle, ?summary, "cycle completed");
                CycleOutcome::Completed(summary)
            }
            Err(failure) => {
                warn!(cycle, stage = %failure.stage, error = %failure.error, "cycle failed");
                self.surface_error(format!("{} refresh failed: {}", failure.stage, failure.error));
                CycleOutcome::Failed(failure)
            }
        }
    }

    async fn cycle_steps(&self) -> std::result::Result<CycleSummary, CycleFailure> {
        let list = self.refresh_list().await?;
        let history = self
            .refresh_history()
            .await
            .map_err(at(CycleStage::History))?;
        Ok(CycleSummary { list, history })
    }

    async fn refresh_list(&self) -> std::result::Result<ListChange, CycleFailure> {
        let fetcher = &self.inner.fetcher;
        let mark = lock(&self.inner.state).status.watermark();
        let snapshot = fetcher
            .list_conversations()
            .await
            .map_err(at(CycleStage::List))?;

        let plan = {
            let state = lock(&self.inner.state);
            plan_list(
                state.list_fingerprint.as_deref(),
                &snapshot,
                state.active.as_ref(),
            )
        };

        match plan {
            ListPlan::Patch(mut instructions) => {
                let mut state = lock(&self.inner.state);
                // Every list row carries its flag, so the cache converges
                // without per-conversation requests.
                for conversation in &snapshot {
                    if state
                        .status
                        .reconcile_since(&conversation.id, conversation.enabled, mark)
                    {
                        instructions.push(RenderInstruction::SetStatus {
                            id: conversation.id.clone(),
                            enabled: conversation.enabled,
                        });
                    }
                }
                state.snapshot = snapshot;
                lock(&self.inner.renderer).apply_all(&instructions);
                Ok(ListChange::Patched)
            }
            ListPlan::Rebuild { fingerprint } => {
                debug!(conversations = snapshot.len(), "list changed; rebuilding rows");
                let flags = try_join_all(snapshot.iter().map(|c| fetcher.get_flag(&c.id)))
                    .await
                    .map_err(at(CycleStage::Flags))?;

                let mut state = lock(&self.inner.state);
                for (conversation, enabled) in snapshot.iter().zip(flags) {
                    state.status.reconcile_since(&conversation.id, enabled, mark);
                }
                let rows = build_rows(
                    &snapshot,
                    &state.status,
                    state.active.as_ref(),
                    &state.filter,
                    self.inner.config.default_enabled,
                );
                state.list_fingerprint = Some(fingerprint);
                state.snapshot = snapshot;
                lock(&self.inner.renderer).apply_all(&rows);
                Ok(ListChange::Rebuilt {
                    rows: rows.len() - 1,
                })
            }
        }
    }

    /// Fetch and merge the active conversation's history, if any.
    async fn refresh_history(&self) -> Result<Option<HistoryChange>> {
        let ticket = lock(&self.inner.state).issue_history_ticket();
        let Some(ticket) = ticket else {
            return Ok(None);
        };
        let history = self.inner.fetcher.get_history(&ticket.id).await?;
        Ok(Some(self.commit_history(&ticket, &history)))
    }

    fn commit_history(
        &self,
        ticket: &HistoryTicket,
        history: &[Message],
    ) -> HistoryChange {
        let mut state = lock(&self.inner.state);
        if !state.is_current(ticket) {
            debug!(conversation = %ticket.id, seq = ticket.seq, "discarding stale history result");
            return HistoryChange::Discarded;
        }

        let cursor = state.cursors.get(&ticket.id).cloned().unwrap_or_default();
        let mut renderer = lock(&self.inner.renderer);
        let was_near_bottom = renderer
            .viewport()
            .is_near_bottom(self.inner.config.near_bottom_threshold_px);
        let outcome = merge_history(&cursor, history, state.switch_pending, was_near_bottom);
        renderer.apply_all(&outcome.instructions);

        if matches!(outcome.kind, MergeKind::Rerendered(_)) && !state.switch_pending {
            debug!(conversation = %ticket.id, previous = cursor.count, now = history.len(), "history discontinuity; re-rendered");
        }
        state.cursors.insert(ticket.id.clone(), outcome.cursor);
        state.switch_pending = false;
        state.history_committed = ticket.seq;
        HistoryChange::Merged(outcome.kind)
    }

    fn surface_error(&self, message: String) {
        let mut state = lock(&self.inner.state);
        state.last_error = Some(message.clone());
        lock(&self.inner.renderer).apply(&RenderInstruction::ShowError { message });
    }

    fn clear_surfaced_error(&self) {
        let mut state = lock(&self.inner.state);
        if state.last_error.take().is_some() {
            lock(&self.inner.renderer).apply(&RenderInstruction::ClearError);
        }
    }

    // -- User actions (not gated by the cycle guard) --

    /// Make `id` the active conversation and render its full history.
    ///
    /// Reselecting the active conversation only refreshes it.
    pub async fn select(&self, id: &ConversationId) -> Result<Option<HistoryChange>> {
        {
            let mut state = lock(&self.inner.state);
            if state.active.as_ref() != Some(id) {
                state.select(Some(id.clone()));
                let enabled = state.status.get(id, self.inner.config.default_enabled);
                let mut renderer = lock(&self.inner.renderer);
                renderer.apply(&RenderInstruction::MarkActiveRow {
                    id: Some(id.clone()),
                });
                renderer.apply(&RenderInstruction::SetStatus {
                    id: id.clone(),
                    enabled,
                });
            }
        }
        self.refresh_history().await.map_err(|e| {
            self.surface_error(format!("could not load {id}: {e}"));
            e
        })
    }

    /// Clear the active conversation.
    pub fn deselect(&self) {
        let mut state = lock(&self.inner.state);
        if state.active.is_none() {
            return;
        }
        state.select(None);
        let mut renderer = lock(&self.inner.renderer);
        renderer.apply(&RenderInstruction::MarkActiveRow { id: None });
        renderer.apply(&RenderInstruction::ClearMessages);
    }

    /// Read the flag of one conversation from the backend and show it.
    ///
    /// Cheaper than a poll cycle when only one flag matters.
    pub async fn refresh_flag(&self, id: &ConversationId) -> Result<bool> {
        let mark = lock(&self.inner.state).status.watermark();
        let enabled = self.inner.fetcher.get_flag(id).await?;

        let mut state = lock(&self.inner.state);
        state.status.reconcile_since(id, enabled, mark);
        let shown = state.status.get(id, self.inner.config.default_enabled);
        lock(&self.inner.renderer).apply(&RenderInstruction::SetStatus {
            id: id.clone(),
            enabled: shown,
        });
        Ok(shown)
    }

    /// Flip the automated-responses flag of `id`.
    ///
    /// The new value is shown immediately. If the backend does not
    /// acknowledge it, the previous value is restored and the error
    /// returned. Returns the value written.
    pub async fn toggle(&self, id: &ConversationId) -> Result<bool> {
        let default = self.inner.config.default_enabled;
        let write = {
            let mut state = lock(&self.inner.state);
            let current = state.status.get(id, default);
            let write = state.status.set_optimistic(id, !current);
            lock(&self.inner.renderer).apply(&RenderInstruction::SetStatus {
                id: id.clone(),
                enabled: write.value,
            });
            write
        };

        match self.inner.fetcher.set_flag(id, write.value).await {
            Ok(()) => Ok(write.value),
            Err(e) => {
                let e = e.into_stale_write(id);
                let mut state = lock(&self.inner.state);
                if state.status.revert(&write) {
                    let enabled = state.status.get(id, default);
                    warn!(conversation = %id, restored = enabled, error = %e, "toggle reverted");
                    lock(&self.inner.renderer).apply(&RenderInstruction::SetStatus {
                        id: id.clone(),
                        enabled,
                    });
                }
                drop(state);
                self.surface_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Send an operator message to `id`.
    ///
    /// Empty text is rejected. When configured, sending is refused while
    /// automated responses are enabled for the conversation. The active
    /// pane is refreshed afterwards; a refresh failure is only surfaced.
    pub async fn send(&self, id: &ConversationId, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::InvalidArgument("message text is empty".into()));
        }
        if self.inner.config.manual_send_requires_disabled && self.flag(id) {
            return Err(SyncError::InvalidState(format!(
                "automated responses are enabled for {id}; disable them before sending manually"
            )));
        }

        self.inner
            .fetcher
            .append_outbound(id, text)
            .await
            .map_err(|e| e.into_stale_write(id))?;

        self.refresh_if_active(id).await;
        Ok(())
    }

    /// Delete the stored history of `id`.
    ///
    /// The render cursor is dropped so the count never exceeds the now empty
    /// history; an active pane is fully re-rendered on refresh.
    pub async fn clear(&self, id: &ConversationId) -> Result<()> {
        self.inner
            .fetcher
            .clear_history(id)
            .await
            .map_err(|e| e.into_stale_write(id))?;
        {
            let mut state = lock(&self.inner.state);
            state.cursors.remove(id);
            if state.active.as_ref() == Some(id) {
                state.switch_pending = true;
            }
        }
        self.refresh_if_active(id).await;
        Ok(())
    }

    async fn refresh_if_active(&self, id: &ConversationId) {
        if self.active().as_ref() != Some(id) {
            return;
        }
        if let Err(e) = self.refresh_history().await {
            warn!(conversation = %id, error = %e, "refresh after write failed");
            self.surface_error(format!("could not refresh {id}: {e}"));
        }
    }

    /// Filter list rows by id or contact name. Rows are re-emitted from the
    /// last snapshot without fetching.
    pub fn set_filter(&self, query: &str) {
        let mut state = lock(&self.inner.state);
        state.filter = query.trim().to_string();
        if state.list_fingerprint.is_none() {
            return;
        }
        let rows = build_rows(
            &state.snapshot,
            &state.status,
            state.active.as_ref(),
            &state.filter,
            self.inner.config.default_enabled,
        );
        lock(&self.inner.renderer).apply_all(&rows);
    }
}
