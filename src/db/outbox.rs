use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ActionStatus, OutboxAction, OutboxActionRow, StatusCounts};

pub async fn insert(pool: &PgPool, action: &OutboxAction) -> Result<OutboxActionRow, sqlx::Error> {
    sqlx::query_as::<_, OutboxActionRow>(
        "INSERT INTO outbox_actions
             (id, action_type, payload, status, attempt_count, next_attempt_at,
              last_error, created_at, updated_at, completed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(action.id)
    .bind(action.action_type.as_str())
    .bind(&action.payload)
    .bind(action.status.as_str())
    .bind(i32::try_from(action.attempt_count).unwrap_or(i32::MAX))
    .bind(action.next_attempt_at)
    .bind(action.last_error.as_deref())
    .bind(action.created_at)
    .bind(action.updated_at)
    .bind(action.completed_at)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<OutboxActionRow>, sqlx::Error> {
    sqlx::query_as::<_, OutboxActionRow>("SELECT * FROM outbox_actions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Atomically claim the oldest due action using SELECT FOR UPDATE SKIP LOCKED.
pub async fn claim_next(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Option<OutboxActionRow>, sqlx::Error> {
    sqlx::query_as::<_, OutboxActionRow>(
        "UPDATE outbox_actions
         SET status = 'IN_FLIGHT', attempt_count = attempt_count + 1, updated_at = $1
         WHERE id = (
             SELECT id FROM outbox_actions
             WHERE status = 'PENDING'
               AND next_attempt_at <= $1
             ORDER BY next_attempt_at ASC, created_at ASC, id ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// `attempt_count` identifies the claim. Returns false when the action is no
/// longer IN_FLIGHT under that claim.
pub async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    attempt_count: i32,
    completed_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE outbox_actions
         SET status = 'COMPLETED', completed_at = $3, updated_at = $3
         WHERE id = $1 AND attempt_count = $2 AND status = 'IN_FLIGHT'",
    )
    .bind(id)
    .bind(attempt_count)
    .bind(completed_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_for_retry(
    pool: &PgPool,
    id: Uuid,
    attempt_count: i32,
    next_attempt_at: DateTime<Utc>,
    error: &str,
    updated_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE outbox_actions
         SET status = 'PENDING', next_attempt_at = $3, last_error = $4, updated_at = $5
         WHERE id = $1 AND attempt_count = $2 AND status = 'IN_FLIGHT'",
    )
    .bind(id)
    .bind(attempt_count)
    .bind(next_attempt_at)
    .bind(error)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_failed(
    pool: &PgPool,
    id: Uuid,
    attempt_count: i32,
    error: &str,
    updated_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE outbox_actions
         SET status = 'FAILED', last_error = $3, updated_at = $4, completed_at = $4
         WHERE id = $1 AND attempt_count = $2 AND status = 'IN_FLIGHT'",
    )
    .bind(id)
    .bind(attempt_count)
    .bind(error)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Return IN_FLIGHT actions last touched before `cutoff` to PENDING, due at `now`.
pub async fn reset_stuck(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
    note: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE outbox_actions
         SET status = 'PENDING', next_attempt_at = $2, updated_at = $2, last_error = $3
         WHERE status = 'IN_FLIGHT' AND updated_at < $1",
    )
    .bind(cutoff)
    .bind(now)
    .bind(note)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_failed(pool: &PgPool, limit: i64) -> Result<Vec<OutboxActionRow>, sqlx::Error> {
    sqlx::query_as::<_, OutboxActionRow>(
        "SELECT * FROM outbox_actions WHERE status = 'FAILED'
         ORDER BY updated_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn count_by_status(pool: &PgPool) -> Result<StatusCounts, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM outbox_actions GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        let count = u64::try_from(count).unwrap_or(0);
        match status.parse::<ActionStatus>() {
            Ok(ActionStatus::Pending) => counts.pending = count,
            Ok(ActionStatus::InFlight) => counts.in_flight = count,
            Ok(ActionStatus::Failed) => counts.failed = count,
            Ok(ActionStatus::Completed) => counts.completed = count,
            Err(e) => tracing::warn!("Skipping unknown status in counts: {e}"),
        }
    }
    Ok(counts)
}
