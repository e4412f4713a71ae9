use crate::error::{Result, StreamError};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

/// Encode an RGB frame as a baseline JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(image.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|e| StreamError::Encode {
            details: format!("JPEG encoding failed: {}", e),
        })?;
    Ok(buffer)
}
