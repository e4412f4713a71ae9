use super::types::{ComponentState, ShutdownHandle, ShutdownReason};
use crate::camera::{create_camera_device, CameraDevice, FrameSource};
use crate::config::EmotionCamConfig;
use crate::error::Result;
use crate::inference::{default_detector_factory, DetectorFactory, InferenceLoop, InferenceSettings};
use crate::store::SharedState;
use crate::streaming::{StreamServer, StreamServerBuilder};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Main application coordinator that wires the shared state to the camera,
/// inference and HTTP components
pub struct EmotionCamOrchestrator {
    pub(super) config: EmotionCamConfig,
    pub(super) store: Arc<SharedState>,

    // Components
    pub(super) frame_source: FrameSource,
    pub(super) camera_device: Option<Box<dyn CameraDevice>>,
    pub(super) inference: InferenceLoop,
    pub(super) detector_factory: Option<DetectorFactory>,
    pub(super) stream_server: Arc<StreamServer>,
    pub(super) server_task: Option<JoinHandle<Result<()>>>,
    pub(super) server_address: Option<SocketAddr>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_handle: ShutdownHandle,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl EmotionCamOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub async fn new(config: EmotionCamConfig) -> Result<Self> {
        let store = Arc::new(SharedState::new(config.inference.enabled_on_start));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let frame_source = FrameSource::new(config.camera.clone(), Arc::clone(&store));
        let inference = InferenceLoop::new(
            InferenceSettings::from(&config.inference),
            Arc::clone(&store),
        );
        let stream_server = StreamServerBuilder::new()
            .config(config.stream.clone())
            .store(Arc::clone(&store))
            .build()?;

        Ok(Self {
            config,
            store,
            frame_source,
            camera_device: None,
            inference,
            detector_factory: None,
            stream_server: Arc::new(stream_server),
            server_task: None,
            server_address: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_handle: ShutdownHandle::new(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Use this camera device instead of the platform default
    pub fn with_camera_device(mut self, device: Box<dyn CameraDevice>) -> Self {
        self.camera_device = Some(device);
        self
    }

    /// Use the synthetic test pattern instead of real hardware
    pub fn with_mock_camera(self) -> Result<Self> {
        let device = create_camera_device(&self.config.camera, true)?;
        Ok(self.with_camera_device(device))
    }

    /// Use this detector factory instead of the ONNX models
    pub fn with_detector_factory(mut self, factory: DetectorFactory) -> Self {
        self.detector_factory = Some(factory);
        self
    }

    /// Shared state handle used by every component
    pub fn store(&self) -> Arc<SharedState> {
        Arc::clone(&self.store)
    }

    /// Address the HTTP server bound to, once started
    pub fn server_address(&self) -> Option<SocketAddr> {
        self.server_address
    }

    /// Request shutdown from inside the process, as if a signal arrived.
    /// Use [`Self::shutdown_handle`] to trigger it while `run()` is awaiting.
    pub fn request_shutdown(&self, reason: ShutdownReason) -> bool {
        self.shutdown_handle.request(reason)
    }

    /// Cloneable trigger that ends a pending `run()`
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    /// Fill in the platform camera and ONNX detector where none was supplied
    pub(super) fn resolve_defaults(&mut self) -> Result<()> {
        if self.camera_device.is_none() {
            self.camera_device = Some(create_camera_device(&self.config.camera, false)?);
        }
        if self.detector_factory.is_none() {
            self.detector_factory = Some(default_detector_factory(&self.config.inference));
        }
        Ok(())
    }
}
