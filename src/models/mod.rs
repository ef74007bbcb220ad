pub mod outbox_action;

pub use outbox_action::{ActionStatus, ActionType, OutboxAction, OutboxActionRow, StatusCounts};
