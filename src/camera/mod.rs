mod device;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod gst_camera;
mod pattern;
mod worker;
#[cfg(test)]
mod tests;

pub use device::CameraDevice;
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use gst_camera::GstCamera;
pub use pattern::TestPatternCamera;
pub use worker::{CaptureStats, FrameSource};

use crate::config::CameraConfig;
use crate::error::Result;
use tracing::info;

/// Build the camera device for this platform.
///
/// `mock` forces the synthetic test pattern; it is also the fallback when
/// GStreamer support is not compiled in.
pub fn create_camera_device(config: &CameraConfig, mock: bool) -> Result<Box<dyn CameraDevice>> {
    if mock {
        info!("Using synthetic test pattern camera");
        return Ok(Box::new(TestPatternCamera::from_config(config)));
    }

    #[cfg(all(target_os = "linux", feature = "camera"))]
    {
        Ok(Box::new(GstCamera::new(config.clone())?))
    }

    #[cfg(not(all(target_os = "linux", feature = "camera")))]
    {
        tracing::warn!("GStreamer camera support is not available on this build; using test pattern");
        Ok(Box::new(TestPatternCamera::from_config(config)))
    }
}
