use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{retry_at, ActionStore, STUCK_RESET_NOTE};
use crate::db;
use crate::error::SyncError;
use crate::models::{ActionType, OutboxAction, StatusCounts};

/// Postgres-backed outbox. Claims rely on `FOR UPDATE SKIP LOCKED`, so any
/// number of connections may call `take_next_action` concurrently.
#[derive(Clone)]
pub struct PgActionStore {
    pool: PgPool,
}

impl PgActionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// Out of range counts cannot match a stored row, so the update is a no-op.
fn claim_token(action: &OutboxAction) -> i32 {
    i32::try_from(action.attempt_count).unwrap_or(-1)
}

#[async_trait]
impl ActionStore for PgActionStore {
    async fn enqueue(
        &self,
        action_type: ActionType,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<OutboxAction, SyncError> {
        let action = OutboxAction::new(action_type, payload, now);
        db::outbox::insert(&self.pool, &action).await?.try_into()
    }

    async fn take_next_action(&self, now: DateTime<Utc>) -> Result<Option<OutboxAction>, SyncError> {
        db::outbox::claim_next(&self.pool, now)
            .await?
            .map(OutboxAction::try_from)
            .transpose()
    }

    async fn mark_completed(
        &self,
        action: &OutboxAction,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        Ok(db::outbox::mark_completed(&self.pool, action.id, claim_token(action), completed_at).await?)
    }

    async fn mark_for_retry(
        &self,
        action: &OutboxAction,
        delay_ms: u64,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let next_attempt_at = retry_at(updated_at, delay_ms);
        Ok(db::outbox::mark_for_retry(
            &self.pool,
            action.id,
            claim_token(action),
            next_attempt_at,
            error,
            updated_at,
        )
        .await?)
    }

    async fn mark_failed(
        &self,
        action: &OutboxAction,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        Ok(db::outbox::mark_failed(&self.pool, action.id, claim_token(action), error, updated_at).await?)
    }

    async fn reset_stuck(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64, SyncError> {
        Ok(db::outbox::reset_stuck(&self.pool, cutoff, now, STUCK_RESET_NOTE).await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OutboxAction>, SyncError> {
        db::outbox::find_by_id(&self.pool, id)
            .await?
            .map(OutboxAction::try_from)
            .transpose()
    }

    async fn list_failed(&self, limit: usize) -> Result<Vec<OutboxAction>, SyncError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        db::outbox::list_failed(&self.pool, limit)
            .await?
            .into_iter()
            .map(OutboxAction::try_from)
            .collect()
    }

    async fn count_by_status(&self) -> Result<StatusCounts, SyncError> {
        Ok(db::outbox::count_by_status(&self.pool).await?)
    }
}
