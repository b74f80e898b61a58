//! Orchestrator lifecycle tests
//!
//! Drives the orchestrator with scripted strategies so no container
//! engine or network is needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use landfall::errors::LandfallError;
use landfall::models::config::{DeployConfig, Target};
use landfall::models::health::ServiceHealth;
use landfall::ops::event::{Event, EventLevel};
use landfall::ops::operation::{Operation, OperationStatus};
use landfall::ops::orchestrator::Orchestrator;
use landfall::ops::registry::OperationRegistry;
use landfall::strategy::DeployStrategy;

const TEST_PHASES: &[&str] = &["Preparing", "Working", "Finishing"];

/// What the scripted strategy should do when executed
#[derive(Clone, Copy)]
enum Script {
    /// Walk every phase and succeed with one service
    Succeed,
    /// Fail hard in the second phase
    FailInPhaseTwo,
    /// Emit phase one, then wait for cancellation
    WaitForCancel,
    /// Emit a large burst of log events, then succeed
    Flood,
    /// Log a migration warning mid-run and still succeed
    WarnAndSucceed,
}

struct ScriptedStrategy {
    script: Script,
}

#[async_trait]
impl DeployStrategy for ScriptedStrategy {
    fn phases(&self) -> &'static [&'static str] {
        TEST_PHASES
    }

    async fn execute(&self, op: &Operation) -> Result<Vec<ServiceHealth>, LandfallError> {
        match self.script {
            Script::Succeed => {
                for (i, name) in TEST_PHASES.iter().enumerate() {
                    if op.cancel_requested() {
                        return Ok(vec![]);
                    }
                    op.emit_phase(i as u32 + 1, name).await;
                }
                Ok(vec![demo_service()])
            }
            Script::FailInPhaseTwo => {
                op.emit_phase(1, TEST_PHASES[0]).await;
                op.emit_phase(2, TEST_PHASES[1]).await;
                Err(LandfallError::DeployError("image pull failed".to_string()))
            }
            Script::WaitForCancel => {
                op.emit_phase(1, TEST_PHASES[0]).await;
                for _ in 0..1000 {
                    if op.cancel_requested() {
                        return Ok(vec![]);
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
                Err(LandfallError::DeployError("never cancelled".to_string()))
            }
            Script::Flood => {
                op.emit_phase(1, TEST_PHASES[0]).await;
                for i in 0..500 {
                    op.emit_log(EventLevel::Info, format!("chatty line {}", i)).await;
                }
                op.emit_phase(3, TEST_PHASES[2]).await;
                Ok(vec![demo_service()])
            }
            Script::WarnAndSucceed => {
                op.emit_phase(1, TEST_PHASES[0]).await;
                op.emit_log(
                    EventLevel::Warn,
                    "migration of bucket assets failed (sync error), continuing without it",
                )
                .await;
                op.emit_phase(2, TEST_PHASES[1]).await;
                op.emit_phase(3, TEST_PHASES[2]).await;
                Ok(vec![demo_service()])
            }
        }
    }
}

fn demo_service() -> ServiceHealth {
    ServiceHealth {
        name: "demo".to_string(),
        state: "running".to_string(),
        health: "none".to_string(),
    }
}

fn orchestrator_with(script: Script) -> Orchestrator {
    let registry = Arc::new(OperationRegistry::new());
    let mut strategies: HashMap<Target, Arc<dyn DeployStrategy>> = HashMap::new();
    strategies.insert(Target::Local, Arc::new(ScriptedStrategy { script }));
    Orchestrator::new(registry, strategies)
}

fn demo_config() -> DeployConfig {
    serde_json::from_value(serde_json::json!({
        "projectName": "demo",
        "composeContent": "services:\n  demo:\n    image: nginx\n",
    }))
    .unwrap()
}

async fn wait_terminal(op: &Operation) -> OperationStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = op.status().await;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("operation did not reach a terminal state in time")
}

async fn collect_events(mut rx: tokio::sync::mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await
    {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_successful_run_reaches_final_phase() {
    let orchestrator = orchestrator_with(Script::Succeed);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();
    assert_eq!(op.total_phases(), 3);

    let status = wait_terminal(&op).await;
    assert_eq!(status, OperationStatus::Completed);

    let snapshot = op.snapshot().await;
    assert_eq!(snapshot.current_phase, snapshot.total_phases);
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_unknown_target_fails_before_any_record() {
    let orchestrator = orchestrator_with(Script::Succeed);
    // Only the local strategy is registered
    let result = orchestrator.start(Target::Ssh, demo_config()).await;
    assert!(matches!(result, Err(LandfallError::UnknownTarget(_))));
}

#[tokio::test]
async fn test_invalid_config_fails_fast() {
    let orchestrator = orchestrator_with(Script::Succeed);
    let config: DeployConfig = serde_json::from_value(serde_json::json!({
        "projectName": "",
        "composeContent": "services: {}",
    }))
    .unwrap();
    let result = orchestrator.start(Target::Local, config).await;
    assert!(matches!(result, Err(LandfallError::ConfigError(_))));
}

#[tokio::test]
async fn test_exactly_one_terminal_event_and_it_is_last() {
    let orchestrator = orchestrator_with(Script::Succeed);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();
    let (_id, rx) = op.subscribe().await;

    let events = collect_events(rx).await;
    assert!(!events.is_empty());

    let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal_count, 1);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_phase_events_are_monotone() {
    let orchestrator = orchestrator_with(Script::Succeed);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();
    let (_id, rx) = op.subscribe().await;

    let events = collect_events(rx).await;
    let indexes: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Phase { index, .. } => Some(*index),
            _ => None,
        })
        .collect();

    assert!(indexes.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*indexes.last().unwrap(), op.total_phases());
}

#[tokio::test]
async fn test_failure_surfaces_as_error_event_with_phase() {
    let orchestrator = orchestrator_with(Script::FailInPhaseTwo);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();
    let (_id, rx) = op.subscribe().await;

    let status = wait_terminal(&op).await;
    assert_eq!(status, OperationStatus::Failed);

    let snapshot = op.snapshot().await;
    assert!(snapshot.error.as_deref().unwrap().contains("image pull failed"));

    let events = collect_events(rx).await;
    match events.last().unwrap() {
        Event::Error {
            message,
            phase,
            recoverable,
        } => {
            assert!(message.contains("image pull failed"));
            assert_eq!(phase.as_deref(), Some(TEST_PHASES[1]));
            assert!(*recoverable);
        }
        other => panic!("expected error event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_cooperative() {
    let orchestrator = orchestrator_with(Script::WaitForCancel);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();

    // Give the strategy time to enter phase one
    tokio::time::sleep(Duration::from_millis(20)).await;

    orchestrator.cancel(op.id()).await.unwrap();
    let status = wait_terminal(&op).await;
    assert_eq!(status, OperationStatus::Cancelled);

    // Second cancel: success, no state change
    orchestrator.cancel(op.id()).await.unwrap();
    assert_eq!(op.status().await, OperationStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_unknown_operation_is_not_found() {
    let orchestrator = orchestrator_with(Script::Succeed);
    let result = orchestrator.cancel(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(LandfallError::NotFound(_))));
}

#[tokio::test]
async fn test_retry_produces_a_new_identity() {
    let orchestrator = orchestrator_with(Script::FailInPhaseTwo);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();
    wait_terminal(&op).await;

    let retried = orchestrator.retry(op.id()).await.unwrap();
    assert_ne!(retried.id(), op.id());
    wait_terminal(&retried).await;

    // The original record's terminal status is untouched
    assert_eq!(op.status().await, OperationStatus::Failed);
}

#[tokio::test]
async fn test_retry_unknown_operation_is_not_found() {
    let orchestrator = orchestrator_with(Script::Succeed);
    let result = orchestrator.retry(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(LandfallError::NotFound(_))));
}

#[tokio::test]
async fn test_never_drained_observer_does_not_stall_the_run() {
    let orchestrator = orchestrator_with(Script::Flood);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();

    // Subscribe but never read a single event
    let (_id, _rx) = op.subscribe().await;

    let status = wait_terminal(&op).await;
    assert_eq!(status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_warnings_do_not_prevent_completion() {
    let orchestrator = orchestrator_with(Script::WarnAndSucceed);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();
    let (_id, rx) = op.subscribe().await;

    let status = wait_terminal(&op).await;
    assert_eq!(status, OperationStatus::Completed);

    let events = collect_events(rx).await;
    let saw_warning = events.iter().any(|e| {
        matches!(e, Event::Log { level: EventLevel::Warn, message, .. } if message.contains("continuing"))
    });
    assert!(saw_warning);

    match events.last().unwrap() {
        Event::Complete { services } => {
            assert_eq!(services.len(), 1);
            assert_eq!(services[0].name, "demo");
        }
        other => panic!("expected complete event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unsubscribed_observer_receives_nothing_more() {
    let orchestrator = orchestrator_with(Script::WaitForCancel);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();

    let (observer_id, mut rx) = orchestrator.subscribe(op.id()).await.unwrap();
    orchestrator.unsubscribe(op.id(), observer_id).await.unwrap();
    // Repeated removal of the same handle is a no-op
    orchestrator.unsubscribe(op.id(), observer_id).await.unwrap();

    orchestrator.cancel(op.id()).await.unwrap();
    wait_terminal(&op).await;

    // The detached channel closes without delivering the terminal event
    while let Some(event) = rx.recv().await {
        assert!(!event.is_terminal());
    }
}

#[tokio::test]
async fn test_late_subscriber_sees_no_replay() {
    let orchestrator = orchestrator_with(Script::Succeed);
    let op = orchestrator
        .start(Target::Local, demo_config())
        .await
        .unwrap();
    wait_terminal(&op).await;

    // Subscribing after the terminal state yields a closed, empty stream:
    // nothing is replayed and the channel ends right away rather than
    // leaving the client hanging on keep-alives
    let (_id, mut rx) = op.subscribe().await;
    let next = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("late subscriber stream must terminate");
    assert!(next.is_none());
}
