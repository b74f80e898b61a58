//! Error types for the Landfall server

use thiserror::Error;

/// Main error type for the Landfall server
#[derive(Error, Debug)]
pub enum LandfallError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown deployment target: {0}")]
    UnknownTarget(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("SSH error: {0}")]
    SshError(String),

    #[error("Migration error: {0}")]
    MigrateError(String),

    #[error("Health check error: {0}")]
    HealthError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for LandfallError {
    fn from(err: anyhow::Error) -> Self {
        LandfallError::Internal(err.to_string())
    }
}
