pub mod app;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod inference;
pub mod store;
pub mod streaming;

pub use app::{ComponentState, EmotionCamOrchestrator, ShutdownHandle, ShutdownReason};
pub use camera::{create_camera_device, CameraDevice, CaptureStats, FrameSource, TestPatternCamera};
pub use config::{CameraConfig, EmotionCamConfig, InferenceConfig, StreamConfig};
pub use detection::{BoundingBox, Detection, ExclusionPolicy, RawFace, UNKNOWN_EMOTION};
pub use error::{CameraError, EmotionCamError, InferenceError, Result, StreamError};
pub use frame::Frame;
pub use inference::{
    default_detector_factory, DetectorFactory, EmotionDetector, InferenceLoop, InferenceSettings,
    InferenceState, InferenceStats,
};
pub use store::{SharedState, Snapshot, StoreStatus};
pub use streaming::{Annotator, StreamServer, StreamServerBuilder};
