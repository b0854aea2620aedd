//! Signal handling for best-effort cancellation
//!
//! Ctrl-C and SIGTERM cancel the batch token. Workers finish the job they are
//! on and stop taking new ones; the remaining jobs are reported as abandoned.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels a batch when the process is asked to stop
pub struct SignalHandler {
    cancel: CancellationToken,
}

impl SignalHandler {
    /// Create a handler that cancels `cancel` on Ctrl-C or SIGTERM
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Spawn the background task watching for signals
    ///
    /// The task also ends quietly once the token is cancelled by someone else.
    pub fn setup(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                match signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl+C signal received"),
                    Err(e) => {
                        warn!("Failed to install Ctrl+C handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("SIGTERM signal received");
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
                    info!("Received Ctrl+C, finishing in-flight downloads");
                },
                _ = terminate => {
                    info!("Received terminate signal, finishing in-flight downloads");
                },
                _ = cancel.cancelled() => return,
            }

            cancel.cancel();
        })
    }
}
