//! Data migrator
//!
//! Best-effort helpers that copy live data from cloud originals into their
//! self-hosted replacements. Every function here returns an error on
//! failure; the calling strategy downgrades it to a warning so one lost
//! dataset never aborts the rest of the deployment. Cloud CLI calls get
//! their credentials injected as environment variables; missing
//! credentials skip the step instead of failing it.

pub mod cache;
pub mod database;
pub mod objects;
pub mod table;

use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use tokio::process::Command;

use crate::errors::LandfallError;
use crate::models::config::{CloudCredentials, MigrationResource};

/// What happened to one migration step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Data was staged/dumped successfully
    Done,

    /// Step was skipped, with the reason for the operation log
    Skipped(String),
}

/// Per-operation migration helper, rooted in the operation's work dir
pub struct Migrator {
    work_dir: PathBuf,
    cloud: Option<CloudCredentials>,
}

impl Migrator {
    pub fn new(work_dir: impl Into<PathBuf>, cloud: Option<CloudCredentials>) -> Self {
        Self {
            work_dir: work_dir.into(),
            cloud,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Directory that receives dumps and staged objects
    pub fn dumps_dir(&self) -> PathBuf {
        self.work_dir.join("dumps")
    }

    /// Directory that receives generated import scripts
    pub fn imports_dir(&self) -> PathBuf {
        self.work_dir.join("imports")
    }

    /// Migrate a single resource, dispatching on its kind.
    pub async fn migrate_resource(
        &self,
        resource: &MigrationResource,
    ) -> Result<MigrationOutcome, LandfallError> {
        match resource {
            MigrationResource::ObjectStore {
                bucket,
                target_endpoint,
            } => self.migrate_object_store(bucket, target_endpoint).await,
            MigrationResource::Database {
                engine,
                host,
                port,
                name,
                user,
                password,
                container,
            } => {
                database::export_database(
                    self,
                    *engine,
                    host,
                    *port,
                    name,
                    user,
                    password.expose_secret(),
                    container,
                )
                .await
            }
            MigrationResource::Table { name, container } => {
                self.export_table(name, container).await
            }
            MigrationResource::Cache {
                host,
                port,
                password,
                container,
            } => {
                cache::export_cache(
                    self,
                    host,
                    *port,
                    password.as_ref().map(|p| p.expose_secret().to_string()),
                    container,
                )
                .await
            }
        }
    }

    async fn migrate_object_store(
        &self,
        bucket: &str,
        target_endpoint: &str,
    ) -> Result<MigrationOutcome, LandfallError> {
        match self.cloud_env() {
            Some(env) => objects::sync_bucket(self, bucket, target_endpoint, &env).await,
            None => Ok(MigrationOutcome::Skipped(format!(
                "no cloud credentials, skipping bucket {}",
                bucket
            ))),
        }
    }

    async fn export_table(
        &self,
        name: &str,
        container: &str,
    ) -> Result<MigrationOutcome, LandfallError> {
        match self.cloud_env() {
            Some(env) => table::export_table(self, name, container, &env).await,
            None => Ok(MigrationOutcome::Skipped(format!(
                "no cloud credentials, skipping table {}",
                name
            ))),
        }
    }

    /// Run every generated import script against the started containers.
    /// Returns the labels of scripts that failed; callers log them as
    /// warnings.
    pub async fn run_import_scripts(&self) -> Result<Vec<String>, LandfallError> {
        let imports = self.imports_dir();
        if !imports.exists() {
            return Ok(Vec::new());
        }

        let mut failed = Vec::new();
        let mut entries = tokio::fs::read_dir(&imports).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sh") {
                continue;
            }
            let status = Command::new("sh").arg(&path).status().await?;
            if !status.success() {
                failed.push(
                    path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string()),
                );
            }
        }
        Ok(failed)
    }

    /// Credential environment for cloud CLI subprocesses, or None when the
    /// config carries no credentials.
    fn cloud_env(&self) -> Option<Vec<(String, String)>> {
        self.cloud.as_ref().map(|cloud| {
            vec![
                (
                    "AWS_ACCESS_KEY_ID".to_string(),
                    cloud.access_key_id.clone(),
                ),
                (
                    "AWS_SECRET_ACCESS_KEY".to_string(),
                    cloud.secret_access_key.expose_secret().to_string(),
                ),
                ("AWS_DEFAULT_REGION".to_string(), cloud.region.clone()),
            ]
        })
    }

    pub(crate) async fn ensure_dirs(&self) -> Result<(), LandfallError> {
        tokio::fs::create_dir_all(self.dumps_dir()).await?;
        tokio::fs::create_dir_all(self.imports_dir()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::MigrationResource;

    #[tokio::test]
    async fn test_object_store_without_credentials_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(tmp.path(), None);
        let resource = MigrationResource::ObjectStore {
            bucket: "assets".to_string(),
            target_endpoint: "http://minio:9000".to_string(),
        };

        let outcome = migrator.migrate_resource(&resource).await.unwrap();
        assert!(matches!(outcome, MigrationOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_run_import_scripts_without_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(tmp.path().join("nothing-here"), None);
        let failed = migrator.run_import_scripts().await.unwrap();
        assert!(failed.is_empty());
    }
}
