#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use uuid::Uuid;

use outbox_sync::clock::{Clock, ManualClock};
use outbox_sync::config::SyncConfig;
use outbox_sync::models::{ActionType, OutboxAction};
use outbox_sync::processors::{ActionProcessor, ProcessError, ProcessorRegistry};
use outbox_sync::store::{ActionStore, InMemoryActionStore};
use outbox_sync::sync::{StuckActionWatchdog, SyncEngine, WorkerRunner};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Deterministic config: no jitter, 1s base, 60s cap.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        max_actions_per_sync: 50,
        in_flight_timeout_ms: 60_000,
        base_backoff_ms: 1_000,
        max_backoff_ms: 60_000,
        jitter_min: 1.0,
        jitter_max: 1.0,
        max_attempts: 5,
        processor_timeout: Duration::from_secs(5),
    }
}

/// Processor that plays back a script of outcomes, then keeps returning
/// `fallback`.
pub struct ScriptedProcessor {
    action_type: ActionType,
    script: Mutex<VecDeque<Result<(), ProcessError>>>,
    fallback: Result<(), ProcessError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Uuid>>,
}

impl ScriptedProcessor {
    pub fn succeeding(action_type: ActionType) -> Self {
        Self::scripted(action_type, Vec::new(), Ok(()))
    }

    pub fn always_failing(action_type: ActionType, error: ProcessError) -> Self {
        Self::scripted(action_type, Vec::new(), Err(error))
    }

    pub fn scripted(
        action_type: ActionType,
        script: Vec<Result<(), ProcessError>>,
        fallback: Result<(), ProcessError>,
    ) -> Self {
        Self {
            action_type,
            script: Mutex::new(script.into()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Uuid> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionProcessor for ScriptedProcessor {
    fn action_type(&self) -> ActionType {
        self.action_type
    }

    async fn process(&self, action: &OutboxAction) -> Result<(), ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(action.id);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Registry with the given processors; every other type succeeds.
pub fn registry_with(processors: Vec<Arc<ScriptedProcessor>>) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    for action_type in ActionType::ALL {
        registry.register(Arc::new(ScriptedProcessor::succeeding(action_type)));
    }
    for processor in processors {
        registry.register(processor);
    }
    registry
}

/// In-memory store, manual clock and the components built on them.
pub struct Harness {
    pub store: Arc<InMemoryActionStore>,
    pub clock: Arc<ManualClock>,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            store: Arc::new(InMemoryActionStore::new()),
            clock: Arc::new(ManualClock::new(start_time())),
            config,
        }
    }

    pub fn engine(&self, registry: ProcessorRegistry) -> SyncEngine {
        SyncEngine::new(
            self.store.clone(),
            Arc::new(registry),
            self.clock.clone(),
            &self.config,
        )
    }

    pub fn watchdog(&self) -> StuckActionWatchdog {
        StuckActionWatchdog::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.in_flight_timeout_ms,
        )
    }

    pub fn runner(&self, registry: ProcessorRegistry) -> WorkerRunner {
        WorkerRunner::new(self.store.clone(), self.watchdog(), self.engine(registry))
    }

    pub async fn enqueue(&self, action_type: ActionType) -> OutboxAction {
        self.store
            .enqueue(action_type, serde_json::json!({ "n": 1 }), self.clock.now())
            .await
            .unwrap()
    }

    pub async fn reload(&self, action: &OutboxAction) -> OutboxAction {
        self.store.get(action.id).await.unwrap().expect("action exists")
    }

    pub fn advance_ms(&self, ms: i64) {
        self.clock.advance(TimeDelta::milliseconds(ms));
    }
}
