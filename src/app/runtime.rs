use super::{EmotionCamOrchestrator, ShutdownHandle, ShutdownReason};
use crate::error::{EmotionCamError, Result};
use tokio::signal;
use tracing::{error, info};

impl EmotionCamOrchestrator {
    /// Run until a shutdown is requested, then shut down and return the exit code
    pub async fn run(&mut self) -> Result<i32> {
        info!("emotioncam is running");

        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| EmotionCamError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        self.setup_signal_handlers(self.shutdown_handle());

        let shutdown_reason = shutdown_receiver.await.map_err(|_| EmotionCamError::System {
            message: "Shutdown channel closed unexpectedly".to_string(),
        })?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?.max(shutdown_reason.exit_code());

        info!("emotioncam shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, handle: ShutdownHandle) {
        // SIGTERM (systemd stop)
        #[cfg(unix)]
        {
            let handle = handle.clone();
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    handle.request(ShutdownReason::Signal("SIGTERM".to_string()));
                }
            });
        }

        // SIGINT (Ctrl+C)
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                handle.request(ShutdownReason::Signal("SIGINT".to_string()));
            }
        });
    }
}
