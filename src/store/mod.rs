pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::error::SyncError;
use crate::models::{ActionType, OutboxAction, StatusCounts};

pub use memory::InMemoryActionStore;
pub use postgres::PgActionStore;

/// Diagnostic written by the watchdog when it recovers a stuck action.
pub const STUCK_RESET_NOTE: &str = "Reset after exceeding in-flight timeout";

/// Durable queue of outbox actions.
///
/// The store is the only shared mutable resource in the sync core. Every
/// transition goes through this interface, and `take_next_action` is the one
/// concurrency-control primitive: concurrent callers must never receive the
/// same action id.
///
/// The `mark_*` transitions only apply while the action is still IN_FLIGHT
/// under the same claim, identified by its `attempt_count`. They return
/// `false` when the row had already moved on, for example when a watchdog
/// reset and a new claim overtook a slow processor.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Append a new PENDING action, due at `now`.
    async fn enqueue(
        &self,
        action_type: ActionType,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<OutboxAction, SyncError>;

    /// Claim the oldest due PENDING action, moving it to IN_FLIGHT and
    /// incrementing its attempt count.
    async fn take_next_action(&self, now: DateTime<Utc>) -> Result<Option<OutboxAction>, SyncError>;

    async fn mark_completed(
        &self,
        action: &OutboxAction,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, SyncError>;

    /// Back to PENDING, due at `updated_at + delay_ms`.
    async fn mark_for_retry(
        &self,
        action: &OutboxAction,
        delay_ms: u64,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SyncError>;

    async fn mark_failed(
        &self,
        action: &OutboxAction,
        error: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, SyncError>;

    /// Move every IN_FLIGHT action last updated before `cutoff` back to
    /// PENDING, immediately eligible. Returns how many were reset.
    async fn reset_stuck(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64, SyncError>;

    async fn get(&self, id: Uuid) -> Result<Option<OutboxAction>, SyncError>;

    /// Permanently failed actions, most recently failed first.
    async fn list_failed(&self, limit: usize) -> Result<Vec<OutboxAction>, SyncError>;

    async fn count_by_status(&self) -> Result<StatusCounts, SyncError>;
}

/// When a retried action becomes due again. Saturates instead of overflowing.
pub(crate) fn retry_at(updated_at: DateTime<Utc>, delay_ms: u64) -> DateTime<Utc> {
    let delay = i64::try_from(delay_ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(TimeDelta::MAX);
    updated_at
        .checked_add_signed(delay)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
