//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Replace every occurrence of a known secret value with a placeholder.
///
/// Applied to every log/error message before it reaches an observer, so
/// credentials embedded in command output or connection strings never leak
/// through the event stream.
pub fn mask_secrets(text: &str, secrets: &[String]) -> String {
    let mut masked = text.to_string();
    for secret in secrets {
        // Very short values would mask unrelated substrings
        if secret.len() >= 4 {
            masked = masked.replace(secret.as_str(), "****");
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secrets_replaces_all_occurrences() {
        let secrets = vec!["hunter2secret".to_string()];
        let text = "auth failed for hunter2secret (tried hunter2secret twice)";
        let masked = mask_secrets(text, &secrets);
        assert!(!masked.contains("hunter2secret"));
        assert_eq!(masked.matches("****").count(), 2);
    }

    #[test]
    fn test_mask_secrets_skips_short_values() {
        let secrets = vec!["ab".to_string()];
        let text = "table name contains ab";
        assert_eq!(mask_secrets(text, &secrets), text);
    }

    #[test]
    fn test_mask_secrets_empty_list() {
        assert_eq!(mask_secrets("nothing to hide", &[]), "nothing to hide");
    }
}
