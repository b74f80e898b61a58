//! Relational database migration
//!
//! Produces an engine-appropriate logical dump plus a ready-to-run import
//! script addressed at the eventual container name. The dump happens now;
//! the import runs later, once the container is up, which decouples
//! dump time from container start-up time.

use tokio::process::Command;
use tracing::debug;

use crate::errors::LandfallError;
use crate::migrate::{MigrationOutcome, Migrator};
use crate::models::config::DatabaseEngine;

#[allow(clippy::too_many_arguments)]
pub async fn export_database(
    migrator: &Migrator,
    engine: DatabaseEngine,
    host: &str,
    port: u16,
    name: &str,
    user: &str,
    password: &str,
    container: &str,
) -> Result<MigrationOutcome, LandfallError> {
    migrator.ensure_dirs().await?;
    let dump_file = migrator.dumps_dir().join(format!("{}.sql", name));

    debug!(database = name, engine = engine.as_str(), "dumping database");

    let output = match engine {
        DatabaseEngine::Postgres => {
            Command::new("pg_dump")
                .args(["-h", host, "-p", &port.to_string(), "-U", user, "-d", name])
                .arg("-f")
                .arg(&dump_file)
                .env("PGPASSWORD", password)
                .output()
                .await
        }
        DatabaseEngine::Mysql => {
            let out = Command::new("mysqldump")
                .args(["-h", host, "-P", &port.to_string(), "-u", user, name])
                .env("MYSQL_PWD", password)
                .output()
                .await;
            if let Ok(out) = &out {
                if out.status.success() {
                    tokio::fs::write(&dump_file, &out.stdout).await?;
                }
            }
            out
        }
    }
    .map_err(|e| LandfallError::MigrateError(format!("failed to run dump tool: {}", e)))?;

    if !output.status.success() {
        return Err(LandfallError::MigrateError(format!(
            "dump of {} failed: {}",
            name,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let script = import_script(engine, container, user, name, &format!("dumps/{}.sql", name));
    let script_path = migrator.imports_dir().join(format!("import-db-{}.sh", name));
    tokio::fs::write(&script_path, script).await?;

    Ok(MigrationOutcome::Done)
}

/// Import script targeting the container that will eventually run the
/// database. Relative paths resolve against the operation's work dir.
pub fn import_script(
    engine: DatabaseEngine,
    container: &str,
    user: &str,
    name: &str,
    dump_file: &str,
) -> String {
    let import_cmd = match engine {
        DatabaseEngine::Postgres => {
            format!("docker exec -i {} psql -U {} -d {}", container, user, name)
        }
        DatabaseEngine::Mysql => {
            format!("docker exec -i {} mysql -u {} {}", container, user, name)
        }
    };
    format!(
        "#!/bin/sh\n\
         # Import {name} into the {container} container.\n\
         set -e\n\
         cd \"$(dirname \"$0\")/..\"\n\
         {import_cmd} < {dump_file}\n"
    )
}
