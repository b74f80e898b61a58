//! Orchestrator service
//!
//! Top-level façade over the operation registry and the strategy set.
//! `start` hands the caller a pending operation immediately; execution
//! runs on its own task and never blocks the HTTP layer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::LandfallError;
use crate::models::config::{DeployConfig, Target};
use crate::ops::event::Event;
use crate::ops::operation::Operation;
use crate::ops::registry::OperationRegistry;
use crate::strategy::DeployStrategy;

/// Creates operations, launches their execution tasks and exposes
/// cancel/retry/subscribe by operation id.
pub struct Orchestrator {
    registry: Arc<OperationRegistry>,
    strategies: HashMap<Target, Arc<dyn DeployStrategy>>,
}

impl Orchestrator {
    /// The strategy set is closed at construction; unknown targets are
    /// rejected at `start` before any record exists.
    pub fn new(
        registry: Arc<OperationRegistry>,
        strategies: HashMap<Target, Arc<dyn DeployStrategy>>,
    ) -> Self {
        Self {
            registry,
            strategies,
        }
    }

    /// Create and launch a new operation. Returns as soon as the record
    /// exists; callers poll or subscribe for progress.
    pub async fn start(
        &self,
        target: Target,
        config: DeployConfig,
    ) -> Result<Arc<Operation>, LandfallError> {
        let strategy = self
            .strategies
            .get(&target)
            .cloned()
            .ok_or_else(|| LandfallError::UnknownTarget(target.to_string()))?;

        // Fail fast: nothing to clean up before the record is created
        config.validate(target)?;

        let op = Operation::new(target, config, strategy.phases().len() as u32);
        self.registry.insert(op.clone()).await;

        info!(operation = %op.id(), target = %target, "starting deployment");

        let task_op = op.clone();
        tokio::spawn(async move {
            run_operation(strategy, task_op).await;
        });

        Ok(op)
    }

    /// Signal cooperative cancellation. Terminal operations ignore it.
    pub async fn cancel(&self, id: Uuid) -> Result<(), LandfallError> {
        let op = self.get(id).await?;
        op.request_cancel().await;
        Ok(())
    }

    /// Re-run a finished (or even still-running) operation's plan under a
    /// fresh id. The original record keeps its history untouched.
    pub async fn retry(&self, id: Uuid) -> Result<Arc<Operation>, LandfallError> {
        let op = self.get(id).await?;
        self.start(op.target(), op.config().clone()).await
    }

    /// Attach a live event stream. No replay of past events.
    pub async fn subscribe(&self, id: Uuid) -> Result<(u64, mpsc::Receiver<Event>), LandfallError> {
        let op = self.get(id).await?;
        Ok(op.subscribe().await)
    }

    /// Detach an observer. Idempotent; an unknown handle is a no-op.
    pub async fn unsubscribe(&self, id: Uuid, observer_id: u64) -> Result<(), LandfallError> {
        let op = self.get(id).await?;
        op.unsubscribe(observer_id).await;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<Operation>, LandfallError> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| LandfallError::NotFound(format!("operation {}", id)))
    }
}

/// Execution task: one per operation, fire-and-forget.
async fn run_operation(strategy: Arc<dyn DeployStrategy>, op: Arc<Operation>) {
    op.mark_running().await;

    let result = strategy.execute(&op).await;

    match &result {
        Ok(_) => info!(operation = %op.id(), "deployment finished"),
        Err(e) => error!(operation = %op.id(), error = %e, "deployment failed"),
    }

    op.finish(result).await;
}
