//! Main application run loop

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::errors::LandfallError;
use crate::health::HealthProber;
use crate::models::config::Target;
use crate::ops::orchestrator::Orchestrator;
use crate::ops::registry::OperationRegistry;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::strategy::{DeployStrategy, LocalStrategy, RemoteStrategy};

/// Run the Landfall server
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), LandfallError> {
    info!("Initializing Landfall server...");

    options.storage.setup().await?;

    let registry = Arc::new(OperationRegistry::new());
    let prober = HealthProber::new(options.prober.clone());

    let mut strategies: HashMap<Target, Arc<dyn DeployStrategy>> = HashMap::new();
    strategies.insert(
        Target::Local,
        Arc::new(LocalStrategy::new(options.storage.clone(), prober.clone())),
    );
    strategies.insert(Target::Ssh, Arc::new(RemoteStrategy::new(prober)));

    let orchestrator = Arc::new(Orchestrator::new(registry, strategies));
    let state = Arc::new(ServerState::new(orchestrator));

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = serve(&options.server, state, async move {
        let _ = server_shutdown_rx.recv().await;
    })
    .await?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(options.max_shutdown_delay, server_handle).await {
        Ok(joined) => {
            joined.map_err(|e| LandfallError::ShutdownError(e.to_string()))??;
        }
        Err(_) => {
            error!(
                "Shutdown timed out after {:?}, forcing shutdown...",
                options.max_shutdown_delay
            );
            std::process::exit(1);
        }
    }

    info!("Shutdown complete");
    Ok(())
}
