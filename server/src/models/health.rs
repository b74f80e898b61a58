//! Service health models

use serde::{Deserialize, Serialize};

/// Observed state of one service in a compose project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    /// Compose service name
    pub name: String,

    /// Raw container state ("running", "exited", ...)
    pub state: String,

    /// Health check result ("healthy", "unhealthy", "starting"),
    /// or "none" for services without a healthcheck
    pub health: String,
}

impl ServiceHealth {
    /// A service counts as converged when it is running and either healthy
    /// or carries no healthcheck at all.
    pub fn is_ready(&self) -> bool {
        self.state == "running" && (self.health == "healthy" || self.health == "none")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_without_healthcheck_is_ready() {
        let svc = ServiceHealth {
            name: "web".to_string(),
            state: "running".to_string(),
            health: "none".to_string(),
        };
        assert!(svc.is_ready());
    }

    #[test]
    fn test_starting_healthcheck_is_not_ready() {
        let svc = ServiceHealth {
            name: "db".to_string(),
            state: "running".to_string(),
            health: "starting".to_string(),
        };
        assert!(!svc.is_ready());
    }

    #[test]
    fn test_exited_is_not_ready() {
        let svc = ServiceHealth {
            name: "job".to_string(),
            state: "exited".to_string(),
            health: "none".to_string(),
        };
        assert!(!svc.is_ready());
    }
}
