mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use serde_json::json;

use outbox_sync::clock::Clock;
use outbox_sync::config::SyncConfig;
use outbox_sync::error::SyncError;
use outbox_sync::models::{ActionStatus, ActionType, OutboxAction};
use outbox_sync::processors::{ProcessError, ProcessorRegistry};
use outbox_sync::store::ActionStore;
use outbox_sync::sync::{BackoffPolicy, ErrorResolver, SyncReport};

use common::{Harness, ScriptedProcessor};

/// Retried actions become due again at once.
fn zero_backoff_config() -> SyncConfig {
    SyncConfig {
        base_backoff_ms: 0,
        max_backoff_ms: 0,
        ..common::test_config()
    }
}

#[tokio::test]
async fn successful_action_is_completed() {
    let h = Harness::new(common::test_config());
    let processor = Arc::new(ScriptedProcessor::succeeding(ActionType::SendHug));
    let engine = h.engine(common::registry_with(vec![processor.clone()]));
    let action = h.enqueue(ActionType::SendHug).await;

    let report = engine.run().await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            processed: 1,
            completed: 1,
            retried: 0,
            failed: 0
        }
    );
    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Completed);
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(stored.completed_at, Some(h.clock.now()));
    assert_eq!(processor.seen(), vec![action.id]);
}

#[tokio::test]
async fn empty_queue_processes_nothing() {
    let h = Harness::new(common::test_config());
    let engine = h.engine(common::registry_with(vec![]));

    let report = engine.run().await.unwrap();
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn transient_failures_retry_then_succeed() {
    let h = Harness::new(common::test_config());
    let processor = Arc::new(ScriptedProcessor::scripted(
        ActionType::SendHug,
        vec![
            Err(ProcessError::transient("no network")),
            Err(ProcessError::transient("timeout")),
        ],
        Ok(()),
    ));
    let engine = h.engine(common::registry_with(vec![processor.clone()]));
    let action = h.enqueue(ActionType::SendHug).await;

    // Pass 1: fails, retry after base delay.
    let report = engine.run().await.unwrap();
    assert_eq!(report.retried, 1);
    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Pending);
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(stored.last_error.as_deref(), Some("no network"));
    assert_eq!(stored.next_attempt_at, h.clock.now() + TimeDelta::milliseconds(1_000));

    // Not due yet.
    assert_eq!(engine.run().await.unwrap().processed, 0);

    // Pass 2: fails again, delay doubles.
    h.advance_ms(1_000);
    engine.run().await.unwrap();
    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Pending);
    assert_eq!(stored.attempt_count, 2);
    assert_eq!(stored.next_attempt_at, h.clock.now() + TimeDelta::milliseconds(2_000));

    // Pass 3: succeeds.
    h.advance_ms(2_000);
    let report = engine.run().await.unwrap();
    assert_eq!(report.completed, 1);

    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Completed);
    assert_eq!(stored.attempt_count, 3);
    assert_eq!(processor.calls(), 3);
}

#[tokio::test]
async fn permanent_failure_is_never_claimed_again() {
    let h = Harness::new(common::test_config());
    let processor = Arc::new(ScriptedProcessor::always_failing(
        ActionType::UpdateProfile,
        ProcessError::permanent("payload rejected"),
    ));
    let engine = h.engine(common::registry_with(vec![processor.clone()]));
    let action = h.enqueue(ActionType::UpdateProfile).await;

    let report = engine.run().await.unwrap();
    assert_eq!(report.failed, 1);

    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Failed);
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(stored.last_error.as_deref(), Some("payload rejected"));

    h.advance_ms(24 * 60 * 60 * 1000);
    assert_eq!(engine.run().await.unwrap().processed, 0);
    assert_eq!(processor.calls(), 1);

    let failed = h.store.list_failed(10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, action.id);
}

#[tokio::test]
async fn unknown_errors_escalate_after_max_attempts() {
    let h = Harness::new(zero_backoff_config());
    let processor = Arc::new(ScriptedProcessor::always_failing(
        ActionType::ClaimDevice,
        ProcessError::from("unexpected response"),
    ));
    let engine = h.engine(common::registry_with(vec![processor.clone()]));
    let action = h.enqueue(ActionType::ClaimDevice).await;

    let report = engine.run().await.unwrap();

    assert_eq!(report.processed, 5);
    assert_eq!(report.retried, 4);
    assert_eq!(report.failed, 1);
    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Failed);
    assert_eq!(stored.attempt_count, 5);
}

#[tokio::test]
async fn pass_stops_at_budget() {
    let h = Harness::new(SyncConfig {
        max_actions_per_sync: 5,
        ..common::test_config()
    });
    let engine = h.engine(common::registry_with(vec![]));
    for _ in 0..10 {
        h.enqueue(ActionType::SendHug).await;
    }

    let report = engine.run().await.unwrap();
    assert_eq!(report.processed, 5);

    let counts = h.store.count_by_status().await.unwrap();
    assert_eq!(counts.completed, 5);
    assert_eq!(counts.pending, 5);

    // The next pass picks up the rest.
    assert_eq!(engine.run().await.unwrap().processed, 5);
    assert_eq!(engine.run().await.unwrap().processed, 0);
}

#[tokio::test]
async fn pass_terminates_when_retries_are_immediately_due() {
    let h = Harness::new(SyncConfig {
        max_actions_per_sync: 7,
        max_attempts: 100,
        ..zero_backoff_config()
    });
    let processor = Arc::new(ScriptedProcessor::always_failing(
        ActionType::SendHug,
        ProcessError::transient("offline"),
    ));
    let engine = h.engine(common::registry_with(vec![processor.clone()]));
    let action = h.enqueue(ActionType::SendHug).await;

    let report = engine.run().await.unwrap();

    assert_eq!(report.processed, 7);
    assert_eq!(report.retried, 7);
    assert_eq!(processor.calls(), 7);
    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Pending);
    assert_eq!(stored.attempt_count, 7);
}

#[tokio::test]
async fn actions_are_processed_oldest_due_first() {
    let h = Harness::new(common::test_config());
    let processor = Arc::new(ScriptedProcessor::succeeding(ActionType::SendHug));
    let engine = h.engine(common::registry_with(vec![processor.clone()]));

    let first = h.enqueue(ActionType::SendHug).await;
    h.advance_ms(10);
    let second = h.enqueue(ActionType::SendHug).await;
    h.advance_ms(10);
    let third = h.enqueue(ActionType::SendHug).await;

    engine.run().await.unwrap();
    assert_eq!(processor.seen(), vec![first.id, second.id, third.id]);
}

#[tokio::test]
async fn stuck_action_is_recovered_and_processed() {
    let h = Harness::new(common::test_config());
    let now = h.clock.now();

    let mut stuck = OutboxAction::new(ActionType::ClaimDevice, json!({ "device": "d1" }), now - TimeDelta::minutes(5));
    stuck.status = ActionStatus::InFlight;
    stuck.attempt_count = 1;
    stuck.updated_at = now - TimeDelta::minutes(2);
    h.store.insert(stuck.clone()).await;

    let engine = h.engine(common::registry_with(vec![]));

    // In flight actions are invisible to the engine.
    assert_eq!(engine.run().await.unwrap().processed, 0);

    let watchdog = h.watchdog();
    assert_eq!(watchdog.reset_stuck_actions().await.unwrap(), 1);
    assert_eq!(watchdog.reset_stuck_actions().await.unwrap(), 0);

    let stored = h.reload(&stuck).await;
    assert_eq!(stored.status, ActionStatus::Pending);
    assert!(stored.next_attempt_at <= h.clock.now());

    assert_eq!(engine.run().await.unwrap().completed, 1);
    let stored = h.reload(&stuck).await;
    assert_eq!(stored.status, ActionStatus::Completed);
    assert_eq!(stored.attempt_count, 2);
}

#[tokio::test]
async fn watchdog_ignores_recent_in_flight_actions() {
    let h = Harness::new(common::test_config());
    let now = h.clock.now();

    let mut busy = OutboxAction::new(ActionType::SendHug, json!({}), now);
    busy.status = ActionStatus::InFlight;
    busy.attempt_count = 1;
    busy.updated_at = now - TimeDelta::seconds(30);
    h.store.insert(busy.clone()).await;

    assert_eq!(h.watchdog().reset_stuck_actions().await.unwrap(), 0);

    h.advance_ms(31_000);
    assert_eq!(h.watchdog().reset_stuck_actions().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_processor_fails_action_and_pass() {
    let h = Harness::new(common::test_config());
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(ScriptedProcessor::succeeding(ActionType::SendHug)));
    let engine = h.engine(registry);

    let orphan = h.enqueue(ActionType::ClaimDevice).await;
    let hug = h.enqueue(ActionType::SendHug).await;

    match engine.run().await {
        Err(SyncError::Configuration(msg)) => assert!(msg.contains("claim_device"), "{msg}"),
        other => panic!("expected configuration error, got {other:?}"),
    }

    let orphan = h.reload(&orphan).await;
    assert_eq!(orphan.status, ActionStatus::Failed);
    assert!(orphan.last_error.unwrap().contains("No processor registered"));

    // The pass stopped at the defect; the rest is untouched.
    assert_eq!(h.reload(&hug).await.status, ActionStatus::Pending);
}

#[tokio::test]
async fn slow_processor_times_out_and_retries() {
    let h = Harness::new(SyncConfig {
        processor_timeout: Duration::from_millis(50),
        ..common::test_config()
    });
    let processor =
        Arc::new(ScriptedProcessor::succeeding(ActionType::SendHug).with_delay(Duration::from_secs(5)));
    let engine = h.engine(common::registry_with(vec![processor]));
    let action = h.enqueue(ActionType::SendHug).await;

    let report = engine.run().await.unwrap();
    assert_eq!(report.retried, 1);

    let stored = h.reload(&action).await;
    assert_eq!(stored.status, ActionStatus::Pending);
    assert!(stored.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn custom_resolver_overrides_config() {
    let h = Harness::new(common::test_config());
    let processor = Arc::new(ScriptedProcessor::always_failing(
        ActionType::SendHug,
        ProcessError::transient("offline"),
    ));
    let engine = h
        .engine(common::registry_with(vec![processor]))
        .with_resolver(ErrorResolver::new(BackoffPolicy::new(7_000, 7_000), 3));
    let action = h.enqueue(ActionType::SendHug).await;

    engine.run().await.unwrap();

    let stored = h.reload(&action).await;
    assert_eq!(stored.next_attempt_at, h.clock.now() + TimeDelta::milliseconds(7_000));
}
