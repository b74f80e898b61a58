//! Storage layout configuration
//!
//! Every operation gets an isolated work directory keyed by its id, so
//! concurrent deployments never share mutable on-disk state.

use std::path::PathBuf;

use uuid::Uuid;

use crate::errors::LandfallError;

/// Storage layout for the server
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Settings file path
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    /// Root of all operation work directories
    pub fn operations_dir(&self) -> PathBuf {
        self.base_dir.join("operations")
    }

    /// Work directory for one operation
    pub fn operation_dir(&self, id: Uuid) -> PathBuf {
        self.operations_dir().join(id.to_string())
    }

    /// Create the base directories
    pub async fn setup(&self) -> Result<(), LandfallError> {
        tokio::fs::create_dir_all(self.operations_dir()).await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // /var/lib/landfall on Linux, the user's home directory elsewhere
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/landfall");

        #[cfg(not(target_os = "linux"))]
        let base_dir = dirs_fallback();

        Self { base_dir }
    }
}

#[cfg(not(target_os = "linux"))]
fn dirs_fallback() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".landfall")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_dirs_are_isolated() {
        let layout = StorageLayout::new("/tmp/landfall-test");
        let a = layout.operation_dir(Uuid::new_v4());
        let b = layout.operation_dir(Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.starts_with(layout.operations_dir()));
    }
}
