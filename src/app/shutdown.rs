use super::{ComponentState, EmotionCamOrchestrator};
use crate::error::{EmotionCamError, Result};
use std::future::Future;
use std::thread;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl EmotionCamOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Workers and MJPEG streams observe this at their next loop check
        self.store.stop();
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // Reverse start order
        for component in ["streaming", "inference", "camera"] {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Stop a specific component
    async fn stop_component(&mut self, component: &str) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let outcome = match component {
            "streaming" => match self.server_task.take() {
                Some(task) => {
                    bounded(component, SERVER_STOP_TIMEOUT, async move {
                        task.await.map_err(|e| {
                            EmotionCamError::component("streaming", format!("Server task failed: {}", e))
                        })?
                    })
                    .await
                }
                None => Ok(()),
            },
            "inference" => match self.inference.take_handle() {
                Some(handle) => join_worker(component, handle).await.map(|stats| {
                    debug!(
                        "Inference ran {} cycles ({} inferences, {} failures)",
                        stats.cycles, stats.inferences, stats.failures
                    );
                }),
                None => Ok(()),
            },
            "camera" => match self.frame_source.take_handle() {
                Some(handle) => join_worker(component, handle).await.map(|stats| {
                    debug!(
                        "Camera captured {} frames ({} read failures)",
                        stats.frames_captured, stats.read_failures
                    );
                }),
                None => Ok(()),
            },
            other => Err(EmotionCamError::component(
                other,
                "Unknown component",
            )),
        };

        match outcome {
            Ok(()) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Err(e) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
        }
    }
}

/// Await `work`, failing with a timeout error once `limit` passes
async fn bounded<T, F>(component: &str, limit: Duration, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(EmotionCamError::System {
            message: format!("{} component stop timeout", component),
        }),
    }
}

/// Join a worker thread without blocking the async runtime
async fn join_worker<T: Send + 'static>(
    component: &str,
    handle: thread::JoinHandle<T>,
) -> Result<T> {
    let name = component.to_string();
    bounded(component, WORKER_STOP_TIMEOUT, async move {
        tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|e| EmotionCamError::component(name.clone(), format!("Join task failed: {}", e)))?
            .map_err(|_| EmotionCamError::component(name, "Worker thread panicked"))
    })
    .await
}
