mod detector;
#[cfg(feature = "onnx")]
mod onnx;
mod worker;

pub use detector::{DetectorFactory, EmotionDetector};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmotionDetector;
pub use worker::{InferenceLoop, InferenceSettings, InferenceState, InferenceStats};

use crate::config::InferenceConfig;

/// Factory for the detector compiled into this build.
///
/// Without the `onnx` feature the factory always fails, which leaves the
/// system streaming unannotated video.
pub fn default_detector_factory(config: &InferenceConfig) -> DetectorFactory {
    #[cfg(feature = "onnx")]
    {
        let config = config.clone();
        Box::new(move || {
            let detector: Box<dyn EmotionDetector> =
                Box::new(OnnxEmotionDetector::from_config(&config)?);
            Ok(detector)
        })
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = config;
        Box::new(|| {
            Err(crate::error::InferenceError::ModelLoad {
                path: String::new(),
                details: "built without the `onnx` feature".to_string(),
            }
            .into())
        })
    }
}
