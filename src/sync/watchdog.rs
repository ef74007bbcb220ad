use std::sync::Arc;

use chrono::TimeDelta;

use crate::clock::Clock;
use crate::error::SyncError;
use crate::store::ActionStore;

/// Recovers actions left IN_FLIGHT by a process that died mid-delivery.
pub struct StuckActionWatchdog {
    store: Arc<dyn ActionStore>,
    clock: Arc<dyn Clock>,
    in_flight_timeout: TimeDelta,
}

impl StuckActionWatchdog {
    pub fn new(store: Arc<dyn ActionStore>, clock: Arc<dyn Clock>, in_flight_timeout_ms: u64) -> Self {
        let in_flight_timeout = i64::try_from(in_flight_timeout_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);

        Self {
            store,
            clock,
            in_flight_timeout,
        }
    }

    /// Reset every action that has been in flight longer than the timeout.
    pub async fn reset_stuck_actions(&self) -> Result<u64, SyncError> {
        let now = self.clock.now();
        let Some(cutoff) = now.checked_sub_signed(self.in_flight_timeout) else {
            return Ok(0);
        };

        let reset = self.store.reset_stuck(cutoff, now).await?;
        if reset > 0 {
            tracing::warn!("Reset {reset} stuck in-flight action(s) older than {cutoff}");
        }
        Ok(reset)
    }
}
