use std::sync::Arc;

use crate::error::SyncError;
use crate::store::ActionStore;

use super::engine::{SyncEngine, SyncReport};
use super::watchdog::StuckActionWatchdog;

/// What the runner reports back to whoever scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    Success,
    /// A transient storage fault; the scheduler may try again soon.
    Retry,
    Failure,
}

/// Summary of one runner invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub reset: u64,
    pub report: SyncReport,
}

/// Entry point for the scheduler: watchdog first, then one engine pass.
pub struct WorkerRunner {
    store: Arc<dyn ActionStore>,
    watchdog: StuckActionWatchdog,
    engine: SyncEngine,
}

impl WorkerRunner {
    pub fn new(store: Arc<dyn ActionStore>, watchdog: StuckActionWatchdog, engine: SyncEngine) -> Self {
        Self {
            store,
            watchdog,
            engine,
        }
    }

    /// Run one pass and translate the outcome for the scheduler.
    pub async fn run(&self) -> WorkResult {
        match self.run_pass().await {
            Ok(_) => WorkResult::Success,
            Err(e) if e.is_transient() => {
                tracing::warn!("Outbox sync hit a transient fault: {e}");
                WorkResult::Retry
            }
            Err(e) => {
                tracing::error!("Outbox sync failed: {e}");
                WorkResult::Failure
            }
        }
    }

    /// Like [`run`](Self::run) but hands back the summary or the raw error.
    pub async fn run_pass(&self) -> Result<PassSummary, SyncError> {
        let reset = self.watchdog.reset_stuck_actions().await?;
        if reset > 0 {
            tracing::debug!("Watchdog returned {reset} action(s) to the queue before this pass");
        }

        let report = self.engine.run().await?;
        tracing::info!(
            "Outbox sync processed {} action(s) (completed={}, retried={}, failed={})",
            report.processed,
            report.completed,
            report.retried,
            report.failed
        );

        match self.store.count_by_status().await {
            Ok(counts) => tracing::debug!(
                "Outbox now pending={} in_flight={} failed={} completed={}",
                counts.pending,
                counts.in_flight,
                counts.failed,
                counts.completed
            ),
            Err(e) => tracing::debug!("Could not count outbox actions: {e}"),
        }

        Ok(PassSummary { reset, report })
    }
}
