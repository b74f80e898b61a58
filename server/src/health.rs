//! Health prober
//!
//! Polls the container engine after start-up until every service reports
//! running and healthy (or carries no healthcheck), or until the retry
//! budget runs out. Budget exhaustion is a degraded-but-successful outcome:
//! callers log it as a warning, never as a deployment failure.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::errors::LandfallError;
use crate::models::health::ServiceHealth;

/// Prober retry knobs. Defaults give a ~60s ceiling.
#[derive(Debug, Clone)]
pub struct ProberOptions {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ProberOptions {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// Outcome of a probe run: the last observed service list, and whether the
/// stack converged within the budget.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub services: Vec<ServiceHealth>,
    pub converged: bool,
}

/// Polls a service-list supplier until convergence or budget exhaustion
#[derive(Debug, Clone, Default)]
pub struct HealthProber {
    options: ProberOptions,
}

impl HealthProber {
    pub fn new(options: ProberOptions) -> Self {
        Self { options }
    }

    /// Poll `fetch` until every reported service is ready at the same
    /// time. The supplier abstraction lets the remote strategy probe
    /// through its SSH session with the same loop.
    pub async fn probe<F, Fut>(&self, mut fetch: F) -> ProbeReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<ServiceHealth>, LandfallError>>,
    {
        let mut last_seen: Vec<ServiceHealth> = Vec::new();

        for attempt in 1..=self.options.attempts {
            match fetch().await {
                Ok(services) => {
                    let all_ready = !services.is_empty() && services.iter().all(|s| s.is_ready());
                    last_seen = services;
                    if all_ready {
                        debug!(attempt, "all services healthy");
                        return ProbeReport {
                            services: last_seen,
                            converged: true,
                        };
                    }
                }
                Err(e) => {
                    debug!(attempt, error = %e, "health probe attempt failed");
                }
            }

            if attempt < self.options.attempts {
                tokio::time::sleep(self.options.interval).await;
            }
        }

        ProbeReport {
            services: last_seen,
            converged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn svc(name: &str, state: &str, health: &str) -> ServiceHealth {
        ServiceHealth {
            name: name.to_string(),
            state: state.to_string(),
            health: health.to_string(),
        }
    }

    fn fast_prober(attempts: u32) -> HealthProber {
        HealthProber::new(ProberOptions {
            attempts,
            interval: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_converges_once_all_services_ready() {
        let calls = AtomicU32::new(0);
        let report = fast_prober(10)
            .probe(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Ok(vec![svc("db", "running", "starting")])
                    } else {
                        Ok(vec![svc("db", "running", "healthy")])
                    }
                }
            })
            .await;

        assert!(report.converged);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.services[0].health, "healthy");
    }

    #[tokio::test]
    async fn test_budget_exhaustion_keeps_last_list() {
        let report = fast_prober(3)
            .probe(|| async { Ok(vec![svc("db", "running", "unhealthy")]) })
            .await;

        assert!(!report.converged);
        assert_eq!(report.services.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_errors_do_not_abort_the_loop() {
        let calls = AtomicU32::new(0);
        let report = fast_prober(5)
            .probe(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 4 {
                        Err(LandfallError::DeployError("engine busy".to_string()))
                    } else {
                        Ok(vec![svc("web", "running", "none")])
                    }
                }
            })
            .await;

        assert!(report.converged);
    }

    #[tokio::test]
    async fn test_empty_service_list_never_converges() {
        let report = fast_prober(2).probe(|| async { Ok(vec![]) }).await;
        assert!(!report.converged);
        assert!(report.services.is_empty());
    }
}
