//! Graceful shutdown handling
//!
//! Turns SIGTERM/SIGINT into a broadcast so the HTTP front stops accepting
//! requests before backends are disconnected and the cache is flushed.

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Graceful shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx }
    }

    /// Subscribe to the shutdown signal
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        info!("Shutdown signal sent");
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for SIGTERM, SIGINT or a manual trigger, then broadcast shutdown
    pub async fn wait_for_shutdown_signal(&self) {
        let mut manual = self.subscribe();

        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
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
            _ = ctrl_c => {
                info!("Received Ctrl+C, starting graceful shutdown");
            }
            _ = terminate => {
                info!("Received SIGTERM, starting graceful shutdown");
            }
            _ = manual.recv() => {
                return;
            }
        }

        self.shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
