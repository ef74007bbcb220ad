use crate::config::SyncConfig;
use crate::processors::{ProcessError, ProcessErrorKind};

use super::backoff::BackoffPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Retry { delay_ms: u64 },
    PermanentFailure,
}

/// Decides what happens to an action whose processor returned an error.
#[derive(Debug, Clone)]
pub struct ErrorResolver {
    backoff: BackoffPolicy,
    max_attempts: u32,
}

impl ErrorResolver {
    pub fn new(backoff: BackoffPolicy, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(BackoffPolicy::from_config(config), config.max_attempts)
    }

    /// `attempt_count` is the action's count after the claim that just failed.
    ///
    /// Transient errors always retry. Unknown errors retry until
    /// `max_attempts` claims have been made, then fail permanently.
    pub fn resolve(&self, error: &ProcessError, attempt_count: u32) -> Resolution {
        match error.kind {
            ProcessErrorKind::Permanent => Resolution::PermanentFailure,
            ProcessErrorKind::Transient => Resolution::Retry {
                delay_ms: self.backoff.delay_ms(attempt_count),
            },
            ProcessErrorKind::Unknown if attempt_count >= self.max_attempts => {
                Resolution::PermanentFailure
            }
            ProcessErrorKind::Unknown => Resolution::Retry {
                delay_ms: self.backoff.delay_ms(attempt_count),
            },
        }
    }
}
