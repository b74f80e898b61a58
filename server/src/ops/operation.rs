//! Operation record: live state plus observer fan-out
//!
//! One `Operation` is owned by the orchestrator task that executes it.
//! Observers subscribe to a bounded event channel; emission never blocks on
//! a slow subscriber. Cancellation is a one-shot token checked
//! cooperatively by the executing strategy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::errors::LandfallError;
use crate::models::config::{DeployConfig, Target};
use crate::models::health::ServiceHealth;
use crate::ops::event::{Event, EventLevel};
use crate::utils::mask_secrets;

/// Capacity of each observer's event buffer. A subscriber that falls more
/// than this many events behind starts losing events instead of stalling
/// the deployment.
const EVENT_BUFFER: usize = 64;

/// Lifecycle status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Running => "running",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time view of an operation, served by the status endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSnapshot {
    pub id: Uuid,
    pub status: OperationStatus,
    pub current_phase: u32,
    pub total_phases: u32,
    pub error: Option<String>,
}

struct OperationState {
    status: OperationStatus,
    current_phase: u32,
    current_phase_name: Option<String>,
    error: Option<String>,
    /// Completion protocol already ran; observers are closed
    finished: bool,
}

struct Observer {
    id: u64,
    tx: mpsc::Sender<Event>,
}

/// One orchestrated run of a deployment
pub struct Operation {
    id: Uuid,
    target: Target,
    config: DeployConfig,
    total_phases: u32,
    secrets: Vec<String>,
    state: RwLock<OperationState>,
    observers: Mutex<Vec<Observer>>,
    next_observer_id: AtomicU64,
    cancel: CancellationToken,
}

impl Operation {
    pub fn new(target: Target, config: DeployConfig, total_phases: u32) -> Arc<Self> {
        let secrets = config.secret_values();
        Arc::new(Self {
            id: Uuid::new_v4(),
            target,
            config,
            total_phases,
            secrets,
            state: RwLock::new(OperationState {
                status: OperationStatus::Pending,
                current_phase: 0,
                current_phase_name: None,
                error: None,
                finished: false,
            }),
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn total_phases(&self) -> u32 {
        self.total_phases
    }

    /// Current state for status polling
    pub async fn snapshot(&self) -> OperationSnapshot {
        let state = self.state.read().await;
        OperationSnapshot {
            id: self.id,
            status: state.status,
            current_phase: state.current_phase,
            total_phases: self.total_phases,
            error: state.error.clone(),
        }
    }

    pub async fn status(&self) -> OperationStatus {
        self.state.read().await.status
    }

    /// Mark the operation running. Only legal from pending.
    pub async fn mark_running(&self) {
        let mut state = self.state.write().await;
        if state.status == OperationStatus::Pending {
            state.status = OperationStatus::Running;
        }
    }

    /// Request cooperative cancellation. Idempotent; a terminal operation
    /// ignores it silently.
    pub async fn request_cancel(&self) {
        {
            let mut state = self.state.write().await;
            if state.status.is_terminal() {
                return;
            }
            state.status = OperationStatus::Cancelled;
        }
        self.cancel.cancel();
        debug!(operation = %self.id, "cancellation requested");
    }

    /// Checked by strategies between phases
    pub fn cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Register a new observer. No replay: the receiver only sees events
    /// emitted after this call. Subscribing to a finished operation yields
    /// an already-closed receiver, so streams built on it terminate
    /// immediately instead of idling forever.
    pub async fn subscribe(&self) -> (u64, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        // Lock order matters: `finish` sets `finished` before it takes the
        // observer lock, so checking under this lock cannot race past a
        // completed run and leave a sender behind.
        let mut observers = self.observers.lock().await;
        if self.state.read().await.finished {
            return (id, rx);
        }
        observers.push(Observer { id, tx });
        (id, rx)
    }

    /// Remove an observer. Idempotent.
    pub async fn unsubscribe(&self, observer_id: u64) {
        let mut observers = self.observers.lock().await;
        observers.retain(|o| o.id != observer_id);
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    /// Fan an event out to every live observer without ever blocking.
    /// An observer with a full buffer loses this event.
    pub async fn emit(&self, event: Event) {
        let event = self.masked(event);
        let observers = self.observers.lock().await;
        for observer in observers.iter() {
            if let Err(mpsc::error::TrySendError::Full(_)) = observer.tx.try_send(event.clone()) {
                debug!(
                    operation = %self.id,
                    observer = observer.id,
                    "observer buffer full, dropping event"
                );
            }
        }
    }

    /// Announce a phase start. `index` is 1-based; `current_phase` only
    /// ever moves forward and never past `total_phases`.
    pub async fn emit_phase(&self, index: u32, name: &str) {
        let index = index.min(self.total_phases);
        {
            let mut state = self.state.write().await;
            if index > state.current_phase {
                state.current_phase = index;
                state.current_phase_name = Some(name.to_string());
            }
        }
        self.emit(Event::Phase {
            name: name.to_string(),
            index,
            total: self.total_phases,
        })
        .await;
    }

    pub async fn emit_progress(&self, percent: u8) {
        self.emit(Event::Progress {
            percent: percent.min(100),
        })
        .await;
    }

    pub async fn emit_log(&self, level: EventLevel, message: impl Into<String>) {
        self.emit(Event::log(level, message)).await;
    }

    /// Completion protocol. Sets the terminal status, emits exactly one
    /// terminal event, then closes every observer stream. Cancellation
    /// that already happened wins over the strategy's own outcome.
    pub async fn finish(&self, outcome: Result<Vec<ServiceHealth>, LandfallError>) {
        let terminal_event = {
            let mut state = self.state.write().await;
            if state.finished {
                return;
            }
            state.finished = true;

            if state.status == OperationStatus::Cancelled {
                Event::Error {
                    message: "deployment cancelled".to_string(),
                    phase: None,
                    recoverable: true,
                }
            } else {
                match outcome {
                    Ok(services) => {
                        state.status = OperationStatus::Completed;
                        state.current_phase = self.total_phases;
                        Event::Complete { services }
                    }
                    Err(err) => {
                        let message = mask_secrets(&err.to_string(), &self.secrets);
                        state.status = OperationStatus::Failed;
                        state.error = Some(message.clone());
                        Event::Error {
                            message,
                            phase: state.current_phase_name.clone(),
                            recoverable: true,
                        }
                    }
                }
            }
        };

        // Terminal event first, stream close after, so no observer can
        // miss the terminal signal.
        self.emit(terminal_event).await;
        let mut observers = self.observers.lock().await;
        observers.clear();
    }

    fn masked(&self, event: Event) -> Event {
        if self.secrets.is_empty() {
            return event;
        }
        match event {
            Event::Log {
                level,
                message,
                timestamp,
            } => Event::Log {
                level,
                message: mask_secrets(&message, &self.secrets),
                timestamp,
            },
            Event::Error {
                message,
                phase,
                recoverable,
            } => Event::Error {
                message: mask_secrets(&message, &self.secrets),
                phase,
                recoverable,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DeployConfig {
        serde_json::from_value(serde_json::json!({
            "projectName": "demo",
            "composeContent": "services: {}",
        }))
        .unwrap()
    }

    fn test_operation() -> Arc<Operation> {
        Operation::new(Target::Local, test_config(), 9)
    }

    #[tokio::test]
    async fn test_new_operation_is_pending() {
        let op = test_operation();
        let snapshot = op.snapshot().await;
        assert_eq!(snapshot.status, OperationStatus::Pending);
        assert_eq!(snapshot.current_phase, 0);
        assert_eq!(snapshot.total_phases, 9);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_phase_index_is_monotone_and_clamped() {
        let op = test_operation();
        op.emit_phase(3, "third").await;
        assert_eq!(op.snapshot().await.current_phase, 3);

        // Going backwards must not regress
        op.emit_phase(2, "second").await;
        assert_eq!(op.snapshot().await.current_phase, 3);

        // Beyond the total is clamped
        op.emit_phase(42, "bogus").await;
        assert_eq!(op.snapshot().await.current_phase, 9);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let op = test_operation();
        op.mark_running().await;

        op.request_cancel().await;
        assert_eq!(op.status().await, OperationStatus::Cancelled);
        assert!(op.cancel_requested());

        // Second cancel is a silent no-op
        op.request_cancel().await;
        assert_eq!(op.status().await, OperationStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_never_reopens_terminal_state() {
        let op = test_operation();
        op.mark_running().await;
        op.finish(Ok(vec![])).await;
        assert_eq!(op.status().await, OperationStatus::Completed);

        op.request_cancel().await;
        assert_eq!(op.status().await, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn test_finish_runs_only_once() {
        let op = test_operation();
        op.mark_running().await;
        op.finish(Ok(vec![])).await;
        op.finish(Err(LandfallError::DeployError("late".to_string())))
            .await;

        let snapshot = op.snapshot().await;
        assert_eq!(snapshot.status, OperationStatus::Completed);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_terminal_event_then_stream_close() {
        let op = test_operation();
        let (_id, mut rx) = op.subscribe().await;
        op.mark_running().await;
        op.finish(Ok(vec![])).await;

        let last = rx.recv().await.expect("terminal event");
        assert!(last.is_terminal());
        // Channel closed after the terminal event
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_masks_secret_values() {
        let config: DeployConfig = serde_json::from_value(serde_json::json!({
            "projectName": "demo",
            "composeContent": "services: {}",
            "cloud": {
                "accessKeyId": "AKIAEXAMPLE",
                "secretAccessKey": "topsecretvalue",
            },
        }))
        .unwrap();
        let op = Operation::new(Target::Local, config, 9);
        op.mark_running().await;

        let (_id, mut rx) = op.subscribe().await;
        op.finish(Err(LandfallError::MigrateError(
            "denied for key topsecretvalue".to_string(),
        )))
        .await;

        let snapshot = op.snapshot().await;
        assert_eq!(snapshot.status, OperationStatus::Failed);
        assert!(!snapshot.error.as_deref().unwrap().contains("topsecretvalue"));

        match rx.recv().await.expect("error event") {
            Event::Error { message, .. } => assert!(!message.contains("topsecretvalue")),
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscribe_after_finish_yields_closed_channel() {
        let op = test_operation();
        op.mark_running().await;
        op.finish(Ok(vec![])).await;

        let (_id, mut rx) = op.subscribe().await;
        assert!(rx.recv().await.is_none());
        assert_eq!(op.observer_count().await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let op = test_operation();
        let (id, _rx) = op.subscribe().await;
        assert_eq!(op.observer_count().await, 1);
        op.unsubscribe(id).await;
        op.unsubscribe(id).await;
        assert_eq!(op.observer_count().await, 0);
    }
}
