pub mod backoff;
pub mod engine;
pub mod resolver;
pub mod runner;
pub mod watchdog;

pub use backoff::BackoffPolicy;
pub use engine::{ActionOutcome, SyncEngine, SyncReport};
pub use resolver::{ErrorResolver, Resolution};
pub use runner::{PassSummary, WorkResult, WorkerRunner};
pub use watchdog::StuckActionWatchdog;
