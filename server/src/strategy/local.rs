//! Local deployment strategy
//!
//! Drives the Docker engine on the same host through the compose CLI.
//! Nine fixed phases; a phase whose resource list is empty skips its work
//! without changing the phase count.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::engine::ComposeEngine;
use crate::errors::LandfallError;
use crate::health::HealthProber;
use crate::migrate::{MigrationOutcome, Migrator};
use crate::models::config::MigrationResource;
use crate::models::health::ServiceHealth;
use crate::ops::event::EventLevel;
use crate::ops::operation::Operation;
use crate::storage::layout::StorageLayout;
use crate::strategy::DeployStrategy;

const PHASES: &[&str] = &[
    "Generating configuration",
    "Downloading function bundles",
    "Migrating object storage",
    "Exporting databases",
    "Creating network",
    "Pulling images",
    "Starting containers",
    "Importing data",
    "Running health checks",
];

pub struct LocalStrategy {
    layout: StorageLayout,
    engine: ComposeEngine,
    prober: HealthProber,
}

impl LocalStrategy {
    pub fn new(layout: StorageLayout, prober: HealthProber) -> Self {
        Self {
            layout,
            engine: ComposeEngine::new(),
            prober,
        }
    }
}

#[async_trait]
impl DeployStrategy for LocalStrategy {
    fn phases(&self) -> &'static [&'static str] {
        PHASES
    }

    async fn execute(&self, op: &Operation) -> Result<Vec<ServiceHealth>, LandfallError> {
        let config = op.config();
        let project = config.project_name.clone();
        let work_dir = self.layout.operation_dir(op.id());
        let migrator = Migrator::new(&work_dir, config.cloud.clone());
        let total = self.phases().len() as u32;

        let mut phase = PhaseCursor::new(total);

        // 1. Generate config files
        phase.enter(op, "Generating configuration").await;
        tokio::fs::create_dir_all(&work_dir).await?;
        tokio::fs::write(work_dir.join("compose.yaml"), &config.compose_content).await?;
        if let Some(env) = &config.env_content {
            tokio::fs::write(work_dir.join(".env"), env).await?;
        }

        // 2. Function bundles
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Downloading function bundles").await;
        if config.function_bundles.is_empty() {
            op.emit_log(EventLevel::Info, "no function bundles to download")
                .await;
        } else {
            let bundles_dir = work_dir.join("functions");
            tokio::fs::create_dir_all(&bundles_dir).await?;
            for bundle in &config.function_bundles {
                let dest = bundles_dir.join(&bundle.name);
                let status = Command::new("curl")
                    .args(["-fsSL", "-o"])
                    .arg(&dest)
                    .arg(&bundle.url)
                    .status()
                    .await
                    .map_err(|e| {
                        LandfallError::DeployError(format!("failed to run curl: {}", e))
                    })?;
                if !status.success() {
                    return Err(LandfallError::DeployError(format!(
                        "download of function bundle {} failed",
                        bundle.name
                    )));
                }
                op.emit_log(
                    EventLevel::Info,
                    format!("downloaded function bundle {}", bundle.name),
                )
                .await;
            }
        }

        // 3. Object storage migration (best effort, per bucket)
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Migrating object storage").await;
        let buckets: Vec<_> = config
            .resources
            .iter()
            .filter(|r| matches!(r, MigrationResource::ObjectStore { .. }))
            .collect();
        migrate_batch(op, &migrator, &buckets).await;

        // 4. Database / table / cache exports (best effort)
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Exporting databases").await;
        let exports: Vec<_> = config
            .resources
            .iter()
            .filter(|r| !matches!(r, MigrationResource::ObjectStore { .. }))
            .collect();
        migrate_batch(op, &migrator, &exports).await;

        // 5. Isolated network
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Creating network").await;
        self.engine
            .network_create(&format!("{}-net", project))
            .await?;

        // 6. Pull images
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Pulling images").await;
        self.engine.pull(&work_dir, &project).await?;

        // 7. Start containers
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Starting containers").await;
        if config.auto_start {
            self.engine.up(&work_dir, &project).await?;
        } else {
            op.emit_log(EventLevel::Info, "autoStart disabled, leaving stack stopped")
                .await;
        }

        // 8. Import migrated data into the running containers
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Importing data").await;
        if config.auto_start {
            match migrator.run_import_scripts().await {
                Ok(failed) => {
                    for script in failed {
                        op.emit_log(
                            EventLevel::Warn,
                            format!("import script {} failed, continuing", script),
                        )
                        .await;
                    }
                }
                Err(e) => {
                    op.emit_log(
                        EventLevel::Warn,
                        format!("data import skipped: {}", e),
                    )
                    .await;
                }
            }
        } else {
            op.emit_log(
                EventLevel::Info,
                "stack not started, import scripts left in the work directory",
            )
            .await;
        }

        // 9. Health checks
        if phase.cancelled(op).await {
            return Ok(vec![]);
        }
        phase.enter(op, "Running health checks").await;
        if !config.auto_start {
            return Ok(vec![]);
        }

        let report = self
            .prober
            .probe(|| self.engine.ps(&work_dir, &project))
            .await;
        if !report.converged {
            // Up-but-not-yet-healthy still counts as a completed deployment
            op.emit_log(
                EventLevel::Warn,
                "health checks did not converge, reporting last observed state",
            )
            .await;
        }
        info!(operation = %op.id(), services = report.services.len(), "local deployment done");
        Ok(report.services)
    }
}

/// Tracks the 1-based phase index and the cancellation checkpoint that
/// precedes every phase.
struct PhaseCursor {
    index: u32,
    total: u32,
}

impl PhaseCursor {
    fn new(total: u32) -> Self {
        Self { index: 0, total }
    }

    async fn enter(&mut self, op: &Operation, name: &str) {
        self.index += 1;
        op.emit_phase(self.index, name).await;
        // Rough overall estimate: phase boundaries only
        let percent = ((self.index - 1) * 100 / self.total) as u8;
        op.emit_progress(percent).await;
    }

    async fn cancelled(&self, op: &Operation) -> bool {
        if op.cancel_requested() {
            op.emit_log(EventLevel::Info, "cancellation requested, stopping")
                .await;
            true
        } else {
            false
        }
    }
}

/// Run a batch of best-effort migrations, downgrading every failure to a
/// warning so one lost dataset never aborts the run.
async fn migrate_batch(op: &Operation, migrator: &Migrator, resources: &[&MigrationResource]) {
    if resources.is_empty() {
        op.emit_log(EventLevel::Info, "nothing to migrate in this phase")
            .await;
        return;
    }
    for resource in resources {
        match migrator.migrate_resource(resource).await {
            Ok(MigrationOutcome::Done) => {
                op.emit_log(EventLevel::Info, format!("migrated {}", resource.label()))
                    .await;
            }
            Ok(MigrationOutcome::Skipped(reason)) => {
                op.emit_log(EventLevel::Info, reason).await;
            }
            Err(e) => {
                warn!(operation = %op.id(), error = %e, "migration step failed");
                op.emit_log(
                    EventLevel::Warn,
                    format!(
                        "migration of {} failed ({}), continuing without it",
                        resource.label(),
                        e
                    ),
                )
                .await;
            }
        }
    }
}
