//! Wide-column table migration
//!
//! Exports the full table contents to a portable JSON file plus a
//! generated import script. The structural translation into the
//! self-hosted store is a documented manual step; the script says so
//! rather than guessing a schema mapping.

use tokio::process::Command;
use tracing::debug;

use crate::errors::LandfallError;
use crate::migrate::{MigrationOutcome, Migrator};

pub async fn export_table(
    migrator: &Migrator,
    name: &str,
    container: &str,
    env: &[(String, String)],
) -> Result<MigrationOutcome, LandfallError> {
    migrator.ensure_dirs().await?;
    let export_file = migrator.dumps_dir().join(format!("table-{}.json", name));

    debug!(table = name, "scanning table");
    let output = Command::new("aws")
        .args(["dynamodb", "scan", "--table-name", name, "--output", "json"])
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .output()
        .await
        .map_err(|e| LandfallError::MigrateError(format!("failed to run aws cli: {}", e)))?;

    if !output.status.success() {
        return Err(LandfallError::MigrateError(format!(
            "scan of table {} failed: {}",
            name,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    tokio::fs::write(&export_file, &output.stdout).await?;

    let script = import_script(name, container);
    let script_path = migrator
        .imports_dir()
        .join(format!("import-table-{}.sh", name));
    tokio::fs::write(&script_path, script).await?;

    Ok(MigrationOutcome::Done)
}

/// Import stub: points the operator at the export and the target
/// container. Translating the item format is a manual step.
pub fn import_script(name: &str, container: &str) -> String {
    format!(
        "#!/bin/sh\n\
         # Table {name} was exported to dumps/table-{name}.json.\n\
         # Translating the item format for the {container} container is a\n\
         # manual step; see the migration guide.\n\
         echo \"table {name}: manual import required (dumps/table-{name}.json)\"\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_script_names_export_and_container() {
        let script = import_script("sessions", "demo-scylla");
        assert!(script.contains("dumps/table-sessions.json"));
        assert!(script.contains("demo-scylla"));
        // The stub must not fail the import phase
        assert!(!script.contains("set -e"));
    }
}
