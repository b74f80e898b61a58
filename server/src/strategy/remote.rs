//! Remote deployment strategy
//!
//! Six fixed phases over one authenticated SSH session. Every remote
//! command is a single exec round trip on the session that phase one
//! opened; files travel over the session's SFTP sub-channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::engine::compose::parse_ps_output;
use crate::errors::LandfallError;
use crate::health::HealthProber;
use crate::models::health::ServiceHealth;
use crate::ops::event::EventLevel;
use crate::ops::operation::Operation;
use crate::ssh::{CommandOutput, SshSession};
use crate::strategy::DeployStrategy;

const PHASES: &[&str] = &[
    "Connecting to server",
    "Verifying Docker",
    "Transferring files",
    "Pulling images",
    "Starting containers",
    "Running health checks",
];

pub struct RemoteStrategy {
    prober: HealthProber,
}

impl RemoteStrategy {
    pub fn new(prober: HealthProber) -> Self {
        Self { prober }
    }
}

#[async_trait]
impl DeployStrategy for RemoteStrategy {
    fn phases(&self) -> &'static [&'static str] {
        PHASES
    }

    async fn execute(&self, op: &Operation) -> Result<Vec<ServiceHealth>, LandfallError> {
        let config = op.config();
        let project = config.project_name.clone();
        let ssh_config = config
            .ssh
            .clone()
            .ok_or_else(|| LandfallError::ConfigError("ssh section missing".to_string()))?;
        let remote_project_dir = format!("{}/{}", ssh_config.remote_dir, project);

        // 1. Connect
        op.emit_phase(1, "Connecting to server").await;
        let host = ssh_config.host.clone();
        let session = tokio::task::spawn_blocking(move || SshSession::connect(&ssh_config))
            .await
            .map_err(|e| LandfallError::Internal(format!("connect task failed: {}", e)))??;
        let session = Arc::new(session);
        op.emit_log(EventLevel::Info, format!("connected to {}", host))
            .await;

        // 2. Verify the container engine
        if cancelled(op).await {
            return Ok(vec![]);
        }
        op.emit_phase(2, "Verifying Docker").await;
        let docker = run_remote(&session, "docker --version".to_string()).await?;
        if !docker.success() {
            return Err(LandfallError::DeployError(format!(
                "docker is not installed on {}: {}",
                host,
                docker.output.trim()
            )));
        }
        let compose = run_remote(
            &session,
            "docker compose version || docker-compose --version".to_string(),
        )
        .await?;
        if !compose.success() {
            return Err(LandfallError::DeployError(format!(
                "docker compose is not installed on {}",
                host
            )));
        }

        // 3. Transfer project files
        if cancelled(op).await {
            return Ok(vec![]);
        }
        op.emit_phase(3, "Transferring files").await;
        {
            let session = session.clone();
            let dir = remote_project_dir.clone();
            let compose_content = config.compose_content.clone();
            let env_content = config.env_content.clone();
            tokio::task::spawn_blocking(move || -> Result<(), LandfallError> {
                session.mkdir_p(&dir)?;
                session.write_file(&format!("{}/compose.yaml", dir), compose_content.as_bytes())?;
                if let Some(env) = env_content {
                    session.write_file(&format!("{}/.env", dir), env.as_bytes())?;
                }
                Ok(())
            })
            .await
            .map_err(|e| LandfallError::Internal(format!("transfer task failed: {}", e)))??;
        }
        op.emit_log(
            EventLevel::Info,
            format!("project files written to {}", remote_project_dir),
        )
        .await;

        // 4. Pull images remotely
        if cancelled(op).await {
            return Ok(vec![]);
        }
        op.emit_phase(4, "Pulling images").await;
        let pull = run_remote(
            &session,
            format!(
                "cd {} && docker compose -p {} pull",
                remote_project_dir, project
            ),
        )
        .await?;
        if !pull.success() {
            return Err(LandfallError::DeployError(format!(
                "remote image pull failed: {}",
                pull.output.trim()
            )));
        }

        // 5. Start containers remotely
        if cancelled(op).await {
            return Ok(vec![]);
        }
        op.emit_phase(5, "Starting containers").await;
        if config.auto_start {
            let up = run_remote(
                &session,
                format!(
                    "cd {} && docker compose -p {} up -d",
                    remote_project_dir, project
                ),
            )
            .await?;
            if !up.success() {
                return Err(LandfallError::DeployError(format!(
                    "remote start failed: {}",
                    up.output.trim()
                )));
            }
        } else {
            op.emit_log(EventLevel::Info, "autoStart disabled, leaving stack stopped")
                .await;
        }

        // 6. Health checks through the same session
        if cancelled(op).await {
            return Ok(vec![]);
        }
        op.emit_phase(6, "Running health checks").await;
        if !config.auto_start {
            return Ok(vec![]);
        }

        let ps_cmd = format!(
            "cd {} && docker compose -p {} ps --format json",
            remote_project_dir, project
        );
        let report = self
            .prober
            .probe(|| {
                let session = session.clone();
                let cmd = ps_cmd.clone();
                async move {
                    let out = run_remote(&session, cmd).await?;
                    if out.success() {
                        Ok(parse_ps_output(&out.output))
                    } else {
                        Err(LandfallError::HealthError(out.output.trim().to_string()))
                    }
                }
            })
            .await;
        if !report.converged {
            op.emit_log(
                EventLevel::Warn,
                "health checks did not converge, reporting last observed state",
            )
            .await;
        }
        info!(operation = %op.id(), services = report.services.len(), "remote deployment done");
        Ok(report.services)
    }
}

async fn cancelled(op: &Operation) -> bool {
    if op.cancel_requested() {
        op.emit_log(EventLevel::Info, "cancellation requested, stopping")
            .await;
        true
    } else {
        false
    }
}

/// One command round trip on the shared session, off the async runtime.
async fn run_remote(
    session: &Arc<SshSession>,
    command: String,
) -> Result<CommandOutput, LandfallError> {
    let session = session.clone();
    tokio::task::spawn_blocking(move || session.exec(&command))
        .await
        .map_err(|e| LandfallError::Internal(format!("exec task failed: {}", e)))?
}
