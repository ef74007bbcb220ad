use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::error::SyncError;
use crate::models::{ActionType, OutboxAction};
use crate::store::ActionStore;
use crate::worker::SyncScheduler;

/// Write path for callers outside the sync core: persist, then ask for a sync.
#[derive(Clone)]
pub struct Outbox {
    store: Arc<dyn ActionStore>,
    scheduler: Arc<dyn SyncScheduler>,
    clock: Arc<dyn Clock>,
}

impl Outbox {
    pub fn new(
        store: Arc<dyn ActionStore>,
        scheduler: Arc<dyn SyncScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
        }
    }

    pub async fn submit(
        &self,
        action_type: ActionType,
        payload: serde_json::Value,
    ) -> Result<OutboxAction, SyncError> {
        let action = self
            .store
            .enqueue(action_type, payload, self.clock.now())
            .await?;
        tracing::debug!("Enqueued outbox action {} (type={action_type})", action.id);

        self.scheduler.schedule_sync(true);
        Ok(action)
    }

    pub async fn submit_typed<T: Serialize>(
        &self,
        action_type: ActionType,
        payload: &T,
    ) -> Result<OutboxAction, SyncError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| SyncError::Internal(format!("Failed to serialize payload: {e}")))?;
        self.submit(action_type, payload).await
    }

    /// Permanently failed actions for user-facing reporting.
    pub async fn failed_actions(&self, limit: usize) -> Result<Vec<OutboxAction>, SyncError> {
        self.store.list_failed(limit).await
    }
}
