//! Object storage migration
//!
//! Two-hop sync: the bucket is staged to local disk first, then uploaded
//! to the self-hosted endpoint. The indirection tolerates targets that are
//! not reachable from the cloud side.

use tokio::process::Command;
use tracing::debug;

use crate::errors::LandfallError;
use crate::migrate::{MigrationOutcome, Migrator};

pub async fn sync_bucket(
    migrator: &Migrator,
    bucket: &str,
    target_endpoint: &str,
    env: &[(String, String)],
) -> Result<MigrationOutcome, LandfallError> {
    migrator.ensure_dirs().await?;
    let staging = migrator.dumps_dir().join(format!("bucket-{}", bucket));
    tokio::fs::create_dir_all(&staging).await?;

    // Hop 1: cloud bucket -> local staging
    let source = format!("s3://{}", bucket);
    debug!(bucket, "staging bucket to local disk");
    let output = Command::new("aws")
        .args(["s3", "sync", &source])
        .arg(&staging)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .output()
        .await
        .map_err(|e| LandfallError::MigrateError(format!("failed to run aws cli: {}", e)))?;
    if !output.status.success() {
        return Err(LandfallError::MigrateError(format!(
            "s3 sync from {} failed: {}",
            bucket,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // Hop 2: local staging -> self-hosted endpoint
    debug!(bucket, endpoint = target_endpoint, "uploading staged objects");
    let output = Command::new("aws")
        .args(["s3", "sync"])
        .arg(&staging)
        .args([&source, "--endpoint-url", target_endpoint])
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .output()
        .await
        .map_err(|e| LandfallError::MigrateError(format!("failed to run aws cli: {}", e)))?;
    if !output.status.success() {
        return Err(LandfallError::MigrateError(format!(
            "s3 upload to {} failed: {}",
            target_endpoint,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(MigrationOutcome::Done)
}
