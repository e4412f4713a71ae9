use super::{ComponentState, EmotionCamOrchestrator, ShutdownReason};
use crate::error::{EmotionCamError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

impl EmotionCamOrchestrator {
    /// Initialize all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing emotioncam components");

        self.resolve_defaults()?;

        let mut states = self.component_states.lock().await;
        states.insert("camera".to_string(), ComponentState::Stopped);
        states.insert("inference".to_string(), ComponentState::Stopped);
        states.insert("streaming".to_string(), ComponentState::Stopped);
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start camera capture, inference and the HTTP server
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting emotioncam system");

        // Camera first so the other components find frames early
        self.set_component_state("camera", ComponentState::Starting)
            .await;
        let device = self.camera_device.take().ok_or_else(|| {
            EmotionCamError::component("camera", "No camera device available; call initialize() first")
        })?;
        if let Err(e) = self.frame_source.start(device) {
            error!("Failed to start camera capture: {}", e);
            self.set_component_state("camera", ComponentState::Failed)
                .await;
            return Err(e);
        }
        self.set_component_state("camera", ComponentState::Running)
            .await;
        info!("Camera capture started");

        // Model loading happens on the inference thread
        self.set_component_state("inference", ComponentState::Starting)
            .await;
        let factory = self.detector_factory.take().ok_or_else(|| {
            EmotionCamError::component("inference", "No detector factory available; call initialize() first")
        })?;
        if let Err(e) = self.inference.start(factory) {
            error!("Failed to start inference: {}", e);
            self.set_component_state("inference", ComponentState::Failed)
                .await;
            return Err(e);
        }
        self.set_component_state("inference", ComponentState::Running)
            .await;
        info!("Inference loop started");

        // A detector that fails to load ends only the inference thread
        if let Some(ready) = self.inference.take_ready() {
            let states = Arc::clone(&self.component_states);
            tokio::spawn(async move {
                let failure = match ready.await {
                    Ok(Ok(())) => return,
                    Ok(Err(reason)) => reason,
                    Err(_) => "inference thread exited before the detector was ready".to_string(),
                };
                warn!("Inference unavailable: {}", failure);
                states
                    .lock()
                    .await
                    .insert("inference".to_string(), ComponentState::Failed);
            });
        }

        self.set_component_state("streaming", ComponentState::Starting)
            .await;
        let listener = match self.stream_server.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to start HTTP server: {}", e);
                self.set_component_state("streaming", ComponentState::Failed)
                    .await;
                return Err(e);
            }
        };
        self.server_address = listener.local_addr().ok();

        let server = Arc::clone(&self.stream_server);
        let token = self.cancellation_token.clone();
        let shutdown = self.shutdown_handle();
        self.server_task = Some(tokio::spawn(async move {
            let result = server.serve(listener, token).await;
            if let Err(e) = &result {
                error!("HTTP server error: {}", e);
                shutdown.request(ShutdownReason::Error(format!("HTTP server failed: {}", e)));
            }
            result
        }));

        self.set_component_state("streaming", ComponentState::Running)
            .await;
        info!(
            "Serving on {}",
            self.server_address
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| self.config.stream.bind_address())
        );

        info!("emotioncam system started successfully");
        Ok(())
    }
}
