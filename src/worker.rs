use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::sync::{WorkResult, WorkerRunner};

/// Asks whoever drives the worker runner for a sync pass.
pub trait SyncScheduler: Send + Sync {
    /// `expedited` requests a pass as soon as possible. Otherwise the request
    /// is folded into the next periodic pass.
    fn schedule_sync(&self, expedited: bool);
}

/// Handle to a running [`spawn`]ed sync loop.
#[derive(Clone)]
pub struct SyncHandle {
    wake: Arc<Notify>,
}

impl SyncScheduler for SyncHandle {
    fn schedule_sync(&self, expedited: bool) {
        if expedited {
            // Stores a permit when the loop is busy, so bursts coalesce into one pass.
            self.wake.notify_one();
        } else {
            tracing::debug!("Sync requested, deferring to the periodic pass");
        }
    }
}

/// Start the sync loop on the current runtime.
///
/// The loop is a single task, so the runner is never invoked concurrently
/// with itself. It runs every `config.interval`, immediately on expedited
/// requests, and backs off after failed passes until shutdown is signaled.
/// Expedited requests do not cut a failure backoff short.
pub fn spawn(
    runner: Arc<WorkerRunner>,
    config: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
) -> (SyncHandle, JoinHandle<()>) {
    let wake = Arc::new(Notify::new());
    let handle = SyncHandle { wake: wake.clone() };
    let join = tokio::spawn(run(runner, config, wake, shutdown));
    (handle, join)
}

async fn run(
    runner: Arc<WorkerRunner>,
    config: SchedulerConfig,
    wake: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("Sync loop started (interval={}s)", config.interval.as_secs());

    let mut consecutive_failures: u32 = 0;
    let mut delay = config.interval;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            // Held, not dropped, while backing off after a failed pass.
            _ = wake.notified(), if consecutive_failures == 0 => {
                tracing::debug!("Expedited sync requested");
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        match runner.run().await {
            WorkResult::Success => {
                consecutive_failures = 0;
                delay = config.interval;
            }
            WorkResult::Retry | WorkResult::Failure => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                delay = outer_backoff(&config, consecutive_failures);
                tracing::warn!(
                    "Sync pass failed ({consecutive_failures} in a row), next attempt in {}s",
                    delay.as_secs()
                );
            }
        }
    }

    tracing::info!("Sync loop stopped");
}

/// Wait before the next pass after `consecutive_failures` failed passes.
pub fn outer_backoff(config: &SchedulerConfig, consecutive_failures: u32) -> Duration {
    if consecutive_failures == 0 {
        return config.interval;
    }
    let exponent = (consecutive_failures - 1).min(31);
    config
        .failure_backoff
        .saturating_mul(2_u32.pow(exponent))
        .min(config.max_backoff)
}
