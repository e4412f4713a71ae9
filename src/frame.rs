use image::RgbImage;
use std::sync::Arc;
use std::time::SystemTime;

/// One decoded camera image plus capture metadata.
///
/// Pixels sit behind an `Arc` and are never written through it: a reader that
/// wants to draw on the frame calls [`Frame::to_image`] and gets its own buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture sequence number, starting at 1
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(id: u64, image: RgbImage) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Read-only view of the pixels
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Independent, mutable copy of the pixels
    pub fn to_image(&self) -> RgbImage {
        self.image.as_ref().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frame_dimensions() {
        let frame = Frame::new(7, RgbImage::new(64, 48));
        assert_eq!(frame.id, 7);
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
    }

    #[test]
    fn test_to_image_is_independent() {
        let frame = Frame::new(1, RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])));
        let mut copy = frame.to_image();
        copy.put_pixel(0, 0, Rgb([255, 255, 255]));

        assert_eq!(frame.image().get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(copy.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }
}
