use crate::detection::RawFace;
use crate::error::Result;
use image::RgbImage;

/// Domain interface for the external emotion model.
///
/// One call per frame: find every face and score each emotion label.
/// Implementations may keep state between calls, hence `&mut self`.
pub trait EmotionDetector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawFace>>;
}

/// Builds the detector on the inference thread.
///
/// Model loading happens there so that a failure only ends inference.
pub type DetectorFactory = Box<dyn FnOnce() -> Result<Box<dyn EmotionDetector>> + Send>;
