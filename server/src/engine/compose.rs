//! Docker Compose command surface
//!
//! All engine interaction goes through the `docker` CLI as subprocesses
//! against a named compose project. Output parsing is defensive: a line
//! the engine prints that we cannot parse degrades to a generic "present"
//! service entry instead of failing the call.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::LandfallError;
use crate::models::health::ServiceHealth;

/// Thin wrapper over the docker/compose CLI for one project directory
#[derive(Debug, Clone, Default)]
pub struct ComposeEngine;

impl ComposeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Create an isolated network for the project. An already-existing
    /// network is fine.
    pub async fn network_create(&self, name: &str) -> Result<(), LandfallError> {
        let output = Command::new("docker")
            .args(["network", "create", name])
            .output()
            .await
            .map_err(|e| LandfallError::DeployError(format!("failed to run docker: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("already exists") {
            debug!(network = name, "network already exists");
            return Ok(());
        }
        Err(LandfallError::DeployError(format!(
            "docker network create failed: {}",
            stderr.trim()
        )))
    }

    /// `docker compose pull` in the project directory
    pub async fn pull(&self, project_dir: &Path, project: &str) -> Result<(), LandfallError> {
        self.compose(project_dir, project, &["pull"]).await?;
        Ok(())
    }

    /// `docker compose up -d` in the project directory
    pub async fn up(&self, project_dir: &Path, project: &str) -> Result<(), LandfallError> {
        self.compose(project_dir, project, &["up", "-d"]).await?;
        Ok(())
    }

    /// Current service list with state and health
    pub async fn ps(
        &self,
        project_dir: &Path,
        project: &str,
    ) -> Result<Vec<ServiceHealth>, LandfallError> {
        let stdout = self
            .compose(project_dir, project, &["ps", "--format", "json"])
            .await?;
        Ok(parse_ps_output(&stdout))
    }

    /// Run a compose subcommand, trying the plugin form first and falling
    /// back to the legacy standalone binary.
    async fn compose(
        &self,
        project_dir: &Path,
        project: &str,
        args: &[&str],
    ) -> Result<String, LandfallError> {
        let output = Command::new("docker")
            .current_dir(project_dir)
            .args(["compose", "-p", project])
            .args(args)
            .output()
            .await;

        let output = match output {
            Ok(out) if out.status.success() => out,
            other => {
                if let Ok(out) = &other {
                    debug!(
                        project = project,
                        "docker compose failed ({}), trying docker-compose",
                        out.status
                    );
                }
                let legacy = Command::new("docker-compose")
                    .current_dir(project_dir)
                    .args(["-p", project])
                    .args(args)
                    .output()
                    .await
                    .map_err(|e| {
                        LandfallError::DeployError(format!("failed to run docker compose: {}", e))
                    })?;
                if !legacy.status.success() {
                    // Surface the plugin's stderr when both forms failed
                    let stderr = match &other {
                        Ok(out) => String::from_utf8_lossy(&out.stderr).trim().to_string(),
                        Err(_) => String::from_utf8_lossy(&legacy.stderr).trim().to_string(),
                    };
                    return Err(LandfallError::DeployError(format!(
                        "docker compose {} failed: {}",
                        args.first().unwrap_or(&""),
                        stderr
                    )));
                }
                legacy
            }
        };

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse `docker compose ps --format json` output.
///
/// Newer engines emit one JSON object per line; older ones emit a single
/// JSON array. Anything unparseable becomes a generic "present" entry.
pub fn parse_ps_output(stdout: &str) -> Vec<ServiceHealth> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
            return values.iter().map(service_from_value).collect();
        }
    }

    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => service_from_value(&value),
            Err(e) => {
                warn!("unparseable compose ps line ({}), marking present", e);
                ServiceHealth {
                    name: line.trim().chars().take(64).collect(),
                    state: "present".to_string(),
                    health: "none".to_string(),
                }
            }
        })
        .collect()
}

fn service_from_value(value: &serde_json::Value) -> ServiceHealth {
    let name = value["Service"]
        .as_str()
        .or_else(|| value["Name"].as_str())
        .unwrap_or("unknown")
        .to_string();
    let state = value["State"].as_str().unwrap_or("present").to_string();
    let health = match value["Health"].as_str() {
        Some("") | None => "none".to_string(),
        Some(h) => h.to_string(),
    };
    ServiceHealth {
        name,
        state,
        health,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_delimited_ps() {
        let out = concat!(
            r#"{"Service":"web","State":"running","Health":"healthy"}"#,
            "\n",
            r#"{"Service":"db","State":"running","Health":"starting"}"#,
            "\n",
        );
        let services = parse_ps_output(out);
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "web");
        assert_eq!(services[0].health, "healthy");
        assert_eq!(services[1].health, "starting");
    }

    #[test]
    fn test_parse_array_form() {
        let out = r#"[{"Service":"web","State":"running","Health":""}]"#;
        let services = parse_ps_output(out);
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].health, "none");
    }

    #[test]
    fn test_unparseable_line_degrades_to_present() {
        let out = "web is totally fine trust me\n";
        let services = parse_ps_output(out);
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].state, "present");
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_ps_output("").is_empty());
        assert!(parse_ps_output("  \n ").is_empty());
    }
}
