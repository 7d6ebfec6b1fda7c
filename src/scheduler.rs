//! Fixed-interval poll scheduler.
//!
//! Each tick tries to take the engine's single cycle permit. If a cycle is
//! still in flight the tick is dropped, not queued, so a slow backend lowers
//! the effective refresh rate instead of stacking requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::engine::{CycleOutcome, SyncEngine};
use crate::error::{Result, SyncError};
use crate::render::Renderer;

/// Counters kept by a running scheduler.
#[derive(Debug, Default)]
struct PollCounters {
    ticks: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of the scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollStats {
    pub ticks: u64,
    /// Ticks that found a cycle already in flight.
    pub dropped: u64,
    pub completed: u64,
    pub failed: u64,
}

impl PollCounters {
    fn snapshot(&self) -> PollStats {
        PollStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &CycleOutcome) {
        let counter = match outcome {
            CycleOutcome::Completed(_) => &self.completed,
            CycleOutcome::Failed(_) => &self.failed,
            CycleOutcome::Skipped => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct PollScheduler<R> {
    engine: SyncEngine<R>,
    period: Duration,
}

impl<R: Renderer + 'static> PollScheduler<R> {
    /// Scheduler using the engine's configured poll interval.
    pub fn new(engine: SyncEngine<R>) -> Self {
        let period = engine.config().poll_interval;
        Self { engine, period }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Spawn the tick loop. The first tick fires immediately.
    pub fn start(self) -> Result<PollHandle<R>> {
        if self.period.is_zero() {
            return Err(SyncError::Configuration(
                "poll interval must be greater than zero".into(),
            ));
        }

        let cancel = CancellationToken::new();
        let counters = Arc::new(PollCounters::default());
        let cycles = TaskTracker::new();
        let engine = self.engine.clone();

        info!(session = %engine.session_id(), period_ms = self.period.as_millis() as u64, "poll scheduler started");

        let task = tokio::spawn(tick_loop(
            engine,
            self.period,
            cancel.clone(),
            Arc::clone(&counters),
            cycles.clone(),
        ));

        Ok(PollHandle {
            engine: self.engine,
            cancel,
            counters,
            cycles,
            task,
        })
    }
}

async fn tick_loop<R: Renderer + 'static>(
    engine: SyncEngine<R>,
    period: Duration,
    cancel: CancellationToken,
    counters: Arc<PollCounters>,
    cycles: TaskTracker,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                counters.ticks.fetch_add(1, Ordering::Relaxed);
                match engine.try_begin_cycle() {
                    Some(permit) => {
                        let engine = engine.clone();
                        let counters = Arc::clone(&counters);
                        cycles.spawn(async move {
                            let outcome = engine.run_cycle(permit).await;
                            counters.record(&outcome);
                        });
                    }
                    None => {
                        debug!("tick dropped: previous cycle still in flight");
                        counters.record(&CycleOutcome::Skipped);
                    }
                }
            }
        }
    }
}

/// Handle to a running scheduler.
pub struct PollHandle<R> {
    engine: SyncEngine<R>,
    cancel: CancellationToken,
    counters: Arc<PollCounters>,
    cycles: TaskTracker,
    task: JoinHandle<()>,
}

impl<R: Renderer + 'static> PollHandle<R> {
    pub fn stats(&self) -> PollStats {
        self.counters.snapshot()
    }

    pub fn engine(&self) -> &SyncEngine<R> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop ticking and wait for an in-flight cycle to finish.
    pub async fn stop(self) -> PollStats {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "tick loop ended abnormally");
        }
        self.cycles.close();
        self.cycles.wait().await;
        let stats = self.counters.snapshot();
        info!(?stats, "poll scheduler stopped");
        stats
    }
}
