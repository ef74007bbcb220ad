use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{retry_at, ActionStore, STUCK_RESET_NOTE};
use crate::error::SyncError;
use crate::models::{ActionStatus, ActionType, OutboxAction, StatusCounts};

/// Mutex-guarded outbox kept in insertion order.
///
/// Holding the lock across select-and-update makes `take_next_action` atomic,
/// which is all the engine needs from a store. Nothing survives the process.
#[derive(Default)]
pub struct InMemoryActionStore {
    actions: Mutex<Vec<OutboxAction>>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fully-formed action as is, bypassing the enqueue defaults.
    pub async fn insert(&self, action: OutboxAction) {
        self.actions.lock().await.push(action);
    }

    pub async fn all(&self) -> Vec<OutboxAction> {
        self.actions.lock().await.clone()
    }

    /// Apply `apply` only if `claimed` is still the live claim of its action.
    async fn transition<F>(&self, claimed: &OutboxAction, apply: F) -> bool
    where
        F: FnOnce(&mut OutboxAction) + Send,
    {
        let mut actions = self.actions.lock().await;
        match actions.iter_mut().find(|a| {
            a.id == claimed.id
                && a.attempt_count == claimed.attempt_count
                && a.status == ActionStatus::InFlight
        })
        {
            Some(action) => {
                apply(action);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ActionStore for InMemoryActionStore {
    async fn enqueue(
        &self,
        action_type: ActionType,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<OutboxAction, SyncError> {
        let action = OutboxAction::new(action_type, payload, now);
        self.actions.lock().await.push(action.clone());
        Ok(action)
    }

    async fn take_next_action(&self, now: DateTime<Utc>) -> Result<Option<OutboxAction>, SyncError> {
        let mut actions = self.actions.lock().await;

        // min_by_key keeps the first of equal keys, so insertion order breaks ties.
        let next = actions
            .iter_mut()
            .filter(|a| a.status == ActionStatus::Pending && a.next_attempt_at <= now)
            .min_by_key(|a| (a.next_attempt_at, a.created_at));

        Ok(next.map(|action| {
            action.status = ActionStatus::InFlight;
            action.attempt_count = action.attempt_count.saturating_add(1);
            action.updated_at = now;
            action.clone()
        }))
    }

    async fn mark_completed(
        &self,
        action: &OutboxAction,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        Ok(self
            .transition(action, |a| {
                a.status = ActionStatus::Completed;
                a.completed_at = Some(completed_at);
                a.updated_at = completed_at;
            })
            .await)
    }

    async fn mark_for_retry(
        &self,
        action: &OutboxAction,
        delay_ms: u64,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let error = error.to_string();
        Ok(self
            .transition(action, |a| {
                a.status = ActionStatus::Pending;
                a.next_attempt_at = retry_at(updated_at, delay_ms);
                a.last_error = Some(error);
                a.updated_at = updated_at;
            })
            .await)
    }

    async fn mark_failed(
        &self,
        action: &OutboxAction,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let error = error.to_string();
        Ok(self
            .transition(action, |a| {
                a.status = ActionStatus::Failed;
                a.last_error = Some(error);
                a.updated_at = updated_at;
                a.completed_at = Some(updated_at);
            })
            .await)
    }

    async fn reset_stuck(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64, SyncError> {
        let mut actions = self.actions.lock().await;
        let mut reset = 0;
        for action in actions
            .iter_mut()
            .filter(|a| a.status == ActionStatus::InFlight && a.updated_at < cutoff)
        {
            action.status = ActionStatus::Pending;
            action.next_attempt_at = now;
            action.updated_at = now;
            action.last_error = Some(STUCK_RESET_NOTE.to_string());
            reset += 1;
        }
        Ok(reset)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OutboxAction>, SyncError> {
        Ok(self.actions.lock().await.iter().find(|a| a.id == id).cloned())
    }

    async fn list_failed(&self, limit: usize) -> Result<Vec<OutboxAction>, SyncError> {
        let actions = self.actions.lock().await;
        let mut failed: Vec<OutboxAction> = actions
            .iter()
            .filter(|a| a.status == ActionStatus::Failed)
            .cloned()
            .collect();
        failed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        failed.truncate(limit);
        Ok(failed)
    }

    async fn count_by_status(&self) -> Result<StatusCounts, SyncError> {
        let actions = self.actions.lock().await;
        let mut counts = StatusCounts::default();
        for action in actions.iter() {
            match action.status {
                ActionStatus::Pending => counts.pending += 1,
                ActionStatus::InFlight => counts.in_flight += 1,
                ActionStatus::Failed => counts.failed += 1,
                ActionStatus::Completed => counts.completed += 1,
            }
        }
        Ok(counts)
    }
}
