use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SyncError;

/// Domain action kinds the outbox knows how to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionType {
    SendHug,
    UpdateProfile,
    ClaimDevice,
    UnclaimDevice,
    UpdateDeviceSettings,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::SendHug,
        ActionType::UpdateProfile,
        ActionType::ClaimDevice,
        ActionType::UnclaimDevice,
        ActionType::UpdateDeviceSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SendHug => "send_hug",
            ActionType::UpdateProfile => "update_profile",
            ActionType::ClaimDevice => "claim_device",
            ActionType::UnclaimDevice => "unclaim_device",
            ActionType::UpdateDeviceSettings => "update_device_settings",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown action type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Pending,
    InFlight,
    Failed,
    Completed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "PENDING",
            ActionStatus::InFlight => "IN_FLIGHT",
            ActionStatus::Failed => "FAILED",
            ActionStatus::Completed => "COMPLETED",
        }
    }

    /// Terminal actions are never claimed again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Failed | ActionStatus::Completed)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ActionStatus::Pending),
            "IN_FLIGHT" => Ok(ActionStatus::InFlight),
            "FAILED" => Ok(ActionStatus::Failed),
            "COMPLETED" => Ok(ActionStatus::Completed),
            other => Err(format!("Unknown action status: {other}")),
        }
    }
}

/// A unit of durable outbound work.
#[derive(Debug, Clone)]
pub struct OutboxAction {
    pub id: Uuid,
    pub action_type: ActionType,
    pub payload: serde_json::Value,
    pub status: ActionStatus,
    /// Number of times the action has been claimed for processing.
    pub attempt_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OutboxAction {
    /// A fresh PENDING action, immediately eligible.
    pub fn new(action_type: ActionType, payload: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            action_type,
            payload,
            status: ActionStatus::Pending,
            attempt_count: 0,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Raw `outbox_actions` row as stored in Postgres.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxActionRow {
    pub id: Uuid,
    pub action_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempt_count: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxActionRow> for OutboxAction {
    type Error = SyncError;

    fn try_from(row: OutboxActionRow) -> Result<Self, Self::Error> {
        let action_type = row
            .action_type
            .parse()
            .map_err(|e| SyncError::Corrupt(format!("action {}: {e}", row.id)))?;
        let status = row
            .status
            .parse()
            .map_err(|e| SyncError::Corrupt(format!("action {}: {e}", row.id)))?;
        let attempt_count = u32::try_from(row.attempt_count).map_err(|_| {
            SyncError::Corrupt(format!(
                "action {}: negative attempt_count {}",
                row.id, row.attempt_count
            ))
        })?;

        Ok(OutboxAction {
            id: row.id,
            action_type,
            payload: row.payload,
            status,
            attempt_count,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Per-status row counts, used for pass summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub in_flight: u64,
    pub failed: u64,
    pub completed: u64,
}
