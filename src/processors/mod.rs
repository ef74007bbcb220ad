pub mod remote_api;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::models::{ActionType, OutboxAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessErrorKind {
    /// Connectivity, timeouts, 5xx: worth trying again later.
    Transient,
    /// Validation or authorization rejections that cannot heal on retry.
    Permanent,
    /// Anything the processor could not classify.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ProcessError {
    pub kind: ProcessErrorKind,
    pub message: String,
}

impl ProcessError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProcessErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ProcessErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: ProcessErrorKind::Unknown,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProcessError {}

impl From<String> for ProcessError {
    fn from(s: String) -> Self {
        ProcessError::unknown(s)
    }
}

impl From<&str> for ProcessError {
    fn from(s: &str) -> Self {
        ProcessError::unknown(s)
    }
}

/// Delivers one kind of action to the remote service.
///
/// Delivery is at-least-once: after an ambiguous failure (say, a timeout
/// after the server already applied the change) the same action is
/// processed again, so implementations must be idempotent for a given
/// action id and payload.
#[async_trait]
pub trait ActionProcessor: Send + Sync {
    fn action_type(&self) -> ActionType;
    async fn process(&self, action: &OutboxAction) -> Result<(), ProcessError>;
}

#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<ActionType, Arc<dyn ActionProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers under the processor's own action type, replacing any
    /// previous registration.
    pub fn register(&mut self, processor: Arc<dyn ActionProcessor>) {
        self.processors.insert(processor.action_type(), processor);
    }

    pub fn get(&self, action_type: ActionType) -> Result<&Arc<dyn ActionProcessor>, SyncError> {
        self.processors.get(&action_type).ok_or_else(|| {
            SyncError::Configuration(format!("No processor registered for {action_type}"))
        })
    }

    /// Every action type must have a processor. Run once at startup.
    pub fn validate(&self) -> Result<(), SyncError> {
        let missing: Vec<&str> = ActionType::ALL
            .iter()
            .filter(|t| !self.processors.contains_key(*t))
            .map(|t| t.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Configuration(format!(
                "No processor registered for: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
