pub mod clock;
pub mod config;
pub mod error;
pub mod db;
pub mod models;
pub mod outbox;
pub mod processors;
pub mod store;
pub mod sync;
pub mod worker;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::processors::ProcessorRegistry;
use crate::store::ActionStore;
use crate::sync::{StuckActionWatchdog, SyncEngine, WorkerRunner};

/// Wire the watchdog and engine around a store and a validated registry.
pub fn build_runner(
    store: Arc<dyn ActionStore>,
    processors: ProcessorRegistry,
    clock: Arc<dyn Clock>,
    config: &SyncConfig,
) -> Result<WorkerRunner, SyncError> {
    config.validate().map_err(SyncError::Configuration)?;
    processors.validate()?;

    let processors = Arc::new(processors);
    let watchdog = StuckActionWatchdog::new(store.clone(), clock.clone(), config.in_flight_timeout_ms);
    let engine = SyncEngine::new(store.clone(), processors, clock, config);

    Ok(WorkerRunner::new(store, watchdog, engine))
}
