use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Graceful shutdown coordinator for the portal server
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    cleanup_timeout: Duration,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl ShutdownCoordinator {
    pub fn new(cleanup_timeout: Duration) -> Self {
        Self { cleanup_timeout }
    }

    /// Resolves on SIGINT, or SIGTERM on unix; handed to `axum::serve`
    pub async fn wait_for_signal() {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, shutting down"),
            _ = terminate => info!("Received SIGTERM, shutting down"),
        }
    }

    /// Run cleanup work once the server has stopped accepting requests
    pub async fn shutdown_all_services<F>(&self, cleanup: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Initiating graceful shutdown of all services...");

        timeout(self.cleanup_timeout, cleanup)
            .await
            .map_err(|_| anyhow::anyhow!("Timeout waiting for services to shut down"))?;

        crate::telemetry::shutdown_telemetry();
        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
