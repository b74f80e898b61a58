//! In-memory cache migration
//!
//! Tries a binary RDB snapshot first; when that fails (managed caches
//! often refuse SYNC), falls back to exporting the key set to a flat file
//! so at least the key inventory survives the move.

use tokio::process::Command;
use tracing::debug;

use crate::errors::LandfallError;
use crate::migrate::{MigrationOutcome, Migrator};

pub async fn export_cache(
    migrator: &Migrator,
    host: &str,
    port: u16,
    password: Option<String>,
    container: &str,
) -> Result<MigrationOutcome, LandfallError> {
    migrator.ensure_dirs().await?;
    let rdb_file = migrator.dumps_dir().join(format!("cache-{}.rdb", host));

    let mut base_args = vec!["-h".to_string(), host.to_string(), "-p".to_string(), port.to_string()];
    if let Some(password) = &password {
        base_args.push("-a".to_string());
        base_args.push(password.clone());
    }

    debug!(host, "attempting RDB snapshot");
    let snapshot = Command::new("redis-cli")
        .args(&base_args)
        .arg("--rdb")
        .arg(&rdb_file)
        .output()
        .await;

    match snapshot {
        Ok(out) if out.status.success() => {
            let script_path = migrator
                .imports_dir()
                .join(format!("import-cache-{}.sh", host));
            tokio::fs::write(&script_path, rdb_import_script(host, container)).await?;
            return Ok(MigrationOutcome::Done);
        }
        Ok(out) => {
            debug!(
                host,
                "RDB snapshot refused ({}), falling back to key export",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Err(e) => {
            debug!(host, "redis-cli unavailable ({}), falling back to key export", e);
        }
    }

    // Fallback: flat key list
    let keys_file = migrator.dumps_dir().join(format!("cache-{}-keys.txt", host));
    let output = Command::new("redis-cli")
        .args(&base_args)
        .args(["--scan", "--pattern", "*"])
        .output()
        .await
        .map_err(|e| LandfallError::MigrateError(format!("failed to run redis-cli: {}", e)))?;

    if !output.status.success() {
        return Err(LandfallError::MigrateError(format!(
            "key export from {} failed: {}",
            host,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    tokio::fs::write(&keys_file, &output.stdout).await?;

    Ok(MigrationOutcome::Skipped(format!(
        "cache {}: snapshot unavailable, exported key list only",
        host
    )))
}

/// Import script copying the snapshot into the container's data dir
fn rdb_import_script(host: &str, container: &str) -> String {
    format!(
        "#!/bin/sh\n\
         # Restore the {host} cache snapshot into the {container} container.\n\
         set -e\n\
         cd \"$(dirname \"$0\")/..\"\n\
         docker cp dumps/cache-{host}.rdb {container}:/data/dump.rdb\n\
         docker restart {container}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rdb_import_script_targets_container_data_dir() {
        let script = rdb_import_script("cache.internal", "demo-redis");
        assert!(script.contains("docker cp dumps/cache-cache.internal.rdb demo-redis:/data/dump.rdb"));
        assert!(script.contains("docker restart demo-redis"));
    }
}
