//! Deployment configuration models

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::errors::LandfallError;

/// Deployment target kind. Closed set, validated at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Docker engine on the same host
    Local,

    /// Remote host reached over SSH
    Ssh,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Local => "local",
            Target::Ssh => "ssh",
        }
    }
}

impl std::str::FromStr for Target {
    type Err = LandfallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Target::Local),
            "ssh" => Ok(Target::Ssh),
            other => Err(LandfallError::UnknownTarget(other.to_string())),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full configuration for one deployment operation.
///
/// Owned by the operation record and never mutated after creation. The
/// strategy reads whichever sections apply to its target; a retry reuses
/// the configuration verbatim under a new operation id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Compose project name, also used as the Docker network prefix
    pub project_name: String,

    /// Full docker-compose file content
    pub compose_content: String,

    /// Optional .env file content written next to the compose file
    #[serde(default)]
    pub env_content: Option<String>,

    /// Start containers after pulling images
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Packaged function bundles to download before starting the stack
    #[serde(default)]
    pub function_bundles: Vec<FunctionBundle>,

    /// Cloud resources whose live data should be migrated
    #[serde(default)]
    pub resources: Vec<MigrationResource>,

    /// Cloud credentials for the migration CLI calls
    #[serde(default)]
    pub cloud: Option<CloudCredentials>,

    /// SSH connection details, required for the ssh target
    #[serde(default)]
    pub ssh: Option<SshConfig>,
}

fn default_true() -> bool {
    true
}

impl DeployConfig {
    /// Validate the parts of the config a strategy cannot recover from.
    pub fn validate(&self, target: Target) -> Result<(), LandfallError> {
        if self.project_name.trim().is_empty() {
            return Err(LandfallError::ConfigError(
                "projectName must not be empty".to_string(),
            ));
        }
        if self.compose_content.trim().is_empty() {
            return Err(LandfallError::ConfigError(
                "composeContent must not be empty".to_string(),
            ));
        }
        if target == Target::Ssh {
            let ssh = self.ssh.as_ref().ok_or_else(|| {
                LandfallError::ConfigError("ssh section is required for the ssh target".to_string())
            })?;
            ssh.validate()?;
        }
        Ok(())
    }

    /// Every credential value that must never appear in an event or log.
    pub fn secret_values(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if let Some(cloud) = &self.cloud {
            secrets.push(cloud.secret_access_key.expose_secret().to_string());
        }
        if let Some(ssh) = &self.ssh {
            if let Some(password) = &ssh.password {
                secrets.push(password.expose_secret().to_string());
            }
        }
        for resource in &self.resources {
            match resource {
                MigrationResource::Database { password, .. } => {
                    secrets.push(password.expose_secret().to_string());
                }
                MigrationResource::Cache {
                    password: Some(password),
                    ..
                } => {
                    secrets.push(password.expose_secret().to_string());
                }
                _ => {}
            }
        }
        secrets.retain(|s| !s.is_empty());
        secrets
    }
}

/// A packaged serverless function to download into the work directory
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionBundle {
    /// Function name, used as the local file name
    pub name: String,

    /// Presigned or public URL of the packaged code archive
    pub url: String,
}

/// A cloud resource whose data is copied into its self-hosted replacement
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MigrationResource {
    /// Object storage bucket, synced into a self-hosted S3-compatible store
    #[serde(rename_all = "camelCase")]
    ObjectStore {
        bucket: String,
        /// Endpoint of the self-hosted object store to re-upload into
        target_endpoint: String,
    },

    /// Relational database, dumped and scripted for later import
    #[serde(rename_all = "camelCase")]
    Database {
        engine: DatabaseEngine,
        host: String,
        #[serde(default = "default_db_port")]
        port: u16,
        name: String,
        user: String,
        password: SecretString,
        /// Name of the container the generated import script targets
        container: String,
    },

    /// Wide-column table, exported to JSON plus an import script
    #[serde(rename_all = "camelCase")]
    Table { name: String, container: String },

    /// In-memory cache, snapshot transfer with a key-list fallback
    #[serde(rename_all = "camelCase")]
    Cache {
        host: String,
        #[serde(default = "default_cache_port")]
        port: u16,
        #[serde(default)]
        password: Option<SecretString>,
        container: String,
    },
}

impl MigrationResource {
    /// Short human-readable label used in progress logs
    pub fn label(&self) -> String {
        match self {
            MigrationResource::ObjectStore { bucket, .. } => format!("bucket {}", bucket),
            MigrationResource::Database { name, .. } => format!("database {}", name),
            MigrationResource::Table { name, .. } => format!("table {}", name),
            MigrationResource::Cache { host, .. } => format!("cache {}", host),
        }
    }
}

fn default_db_port() -> u16 {
    5432
}

fn default_cache_port() -> u16 {
    6379
}

/// Relational engine family, selects the dump tool and import client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
}

impl DatabaseEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEngine::Postgres => "postgres",
            DatabaseEngine::Mysql => "mysql",
        }
    }
}

/// Cloud CLI credentials, injected as environment variables
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// SSH authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Key,
    Password,
}

/// SSH connection details for the remote strategy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub user: String,

    pub auth_method: AuthMethod,

    /// Path to the private key file (key auth)
    #[serde(default)]
    pub key_path: Option<String>,

    /// Password (password auth)
    #[serde(default)]
    pub password: Option<SecretString>,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Directory on the remote host that holds the project files
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_remote_dir() -> String {
    "/opt/landfall".to_string()
}

impl SshConfig {
    pub fn validate(&self) -> Result<(), LandfallError> {
        if self.host.trim().is_empty() {
            return Err(LandfallError::ConfigError(
                "ssh.host must not be empty".to_string(),
            ));
        }
        match self.auth_method {
            AuthMethod::Key if self.key_path.is_none() => Err(LandfallError::ConfigError(
                "ssh.keyPath is required for key auth".to_string(),
            )),
            AuthMethod::Password if self.password.is_none() => Err(LandfallError::ConfigError(
                "ssh.password is required for password auth".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
