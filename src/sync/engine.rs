use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::OutboxAction;
use crate::processors::{ProcessError, ProcessorRegistry};
use crate::store::ActionStore;

use super::resolver::{ErrorResolver, Resolution};

/// What happened to a single claimed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    Retrying { delay_ms: u64 },
    Failed,
}

/// Tally of one pass. `processed` counts every claimed action, whatever
/// its outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub processed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: ActionOutcome) {
        self.processed += 1;
        match outcome {
            ActionOutcome::Completed => self.completed += 1,
            ActionOutcome::Retrying { .. } => self.retried += 1,
            ActionOutcome::Failed => self.failed += 1,
        }
    }
}

/// Drains due actions from the store, one at a time.
pub struct SyncEngine {
    store: Arc<dyn ActionStore>,
    processors: Arc<ProcessorRegistry>,
    resolver: ErrorResolver,
    clock: Arc<dyn Clock>,
    max_actions_per_sync: usize,
    processor_timeout: Duration,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ActionStore>,
        processors: Arc<ProcessorRegistry>,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            store,
            processors,
            resolver: ErrorResolver::from_config(config),
            clock,
            max_actions_per_sync: config.max_actions_per_sync,
            processor_timeout: config.processor_timeout,
        }
    }

    pub fn with_resolver(mut self, resolver: ErrorResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run one pass: claim, dispatch and settle due actions until none are
    /// left or `max_actions_per_sync` have been claimed.
    ///
    /// Per-action failures are resolved here. Store faults and missing
    /// processor registrations are returned to the caller.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        while report.processed < self.max_actions_per_sync {
            let Some(action) = self.store.take_next_action(self.clock.now()).await? else {
                break;
            };

            let outcome = self.process(&action).await?;
            report.record(outcome);
        }

        if report.processed == self.max_actions_per_sync {
            tracing::debug!(
                "Sync pass stopped at budget of {} actions",
                self.max_actions_per_sync
            );
        }

        Ok(report)
    }

    async fn process(&self, action: &OutboxAction) -> Result<ActionOutcome, SyncError> {
        tracing::debug!(
            "Processing outbox action {} (type={}, attempt={})",
            action.id,
            action.action_type,
            action.attempt_count
        );

        let processor = match self.processors.get(action.action_type) {
            Ok(processor) => processor,
            Err(err) => {
                // Retrying cannot fix a missing registration.
                let applied = self
                    .store
                    .mark_failed(action, &err.to_string(), self.clock.now())
                    .await?;
                self.warn_if_stale(action, applied);
                tracing::error!("Action {} failed: {err}", action.id);
                return Err(err);
            }
        };

        let result = match tokio::time::timeout(self.processor_timeout, processor.process(action)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProcessError::transient(format!(
                "Processor timed out after {}s",
                self.processor_timeout.as_secs_f64()
            ))),
        };

        let outcome = match result {
            Ok(()) => {
                let applied = self.store.mark_completed(action, self.clock.now()).await?;
                self.warn_if_stale(action, applied);
                tracing::debug!("Action {} completed", action.id);
                ActionOutcome::Completed
            }
            Err(err) => match self.resolver.resolve(&err, action.attempt_count) {
                Resolution::Retry { delay_ms } => {
                    let applied = self
                        .store
                        .mark_for_retry(action, delay_ms, &err.message, self.clock.now())
                        .await?;
                    self.warn_if_stale(action, applied);
                    tracing::warn!(
                        "Action {} attempt {} failed, retrying in {delay_ms}ms: {err}",
                        action.id,
                        action.attempt_count
                    );
                    ActionOutcome::Retrying { delay_ms }
                }
                Resolution::PermanentFailure => {
                    let applied = self
                        .store
                        .mark_failed(action, &err.message, self.clock.now())
                        .await?;
                    self.warn_if_stale(action, applied);
                    tracing::error!(
                        "Action {} failed permanently after {} attempts: {err}",
                        action.id,
                        action.attempt_count
                    );
                    ActionOutcome::Failed
                }
            },
        };

        Ok(outcome)
    }

    fn warn_if_stale(&self, action: &OutboxAction, applied: bool) {
        if !applied {
            tracing::warn!(
                "Action {} was no longer in flight when its outcome was recorded",
                action.id
            );
        }
    }
}
