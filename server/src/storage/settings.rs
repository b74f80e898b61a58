//! Settings file management

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::LandfallError;
use crate::logs::LogLevel;

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Base data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Health prober: maximum poll attempts
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Health prober: seconds between polls
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_data_dir() -> String {
    "/var/lib/landfall".to_string()
}

fn default_probe_attempts() -> u32 {
    30
}

fn default_probe_interval() -> u64 {
    2
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            server: ServerSettings::default(),
            data_dir: default_data_dir(),
            probe_attempts: default_probe_attempts(),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; a missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self, LandfallError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8466
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
