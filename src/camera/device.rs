use crate::error::Result;
use image::RgbImage;

/// A capture device that can be opened, read frame by frame, and released.
///
/// Reads are blocking. After a failed read the caller is expected to
/// `release` and `open` again.
pub trait CameraDevice: Send {
    fn open(&mut self) -> Result<()>;

    fn read(&mut self) -> Result<RgbImage>;

    fn release(&mut self);

    fn is_open(&self) -> bool;
}
