use crate::config::StreamConfig;
use crate::detection::Detection;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::fs;
use tracing::{debug, warn};

pub const HAPPY_COLOR: Rgb<u8> = Rgb([34, 197, 94]);
pub const NEGATIVE_COLOR: Rgb<u8> = Rgb([239, 68, 68]);
pub const ACCENT_COLOR: Rgb<u8> = Rgb([56, 189, 248]);

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 2;
const LABEL_PADDING: i32 = 4;

/// Annotation colour for a dominant emotion label
pub fn label_color(dominant: &str) -> Rgb<u8> {
    match dominant {
        "happy" => HAPPY_COLOR,
        "angry" | "disgust" => NEGATIVE_COLOR,
        _ => ACCENT_COLOR,
    }
}

/// Caption drawn above a face, e.g. `HAPPY 87%`
pub fn label_text(detection: &Detection) -> String {
    let label = detection.dominant.to_uppercase();
    match detection.dominant_score() {
        Some(score) => format!("{} {}%", label, (score * 100.0) as i32),
        None => label,
    }
}

/// Draws detection boxes and captions onto frames.
///
/// The font is optional: without one only the boxes are drawn.
pub struct Annotator {
    font: Option<Font<'static>>,
    scale: Scale,
}

impl Annotator {
    pub fn new(font: Option<Font<'static>>, font_size: f32) -> Self {
        Self {
            font,
            scale: Scale::uniform(font_size),
        }
    }

    /// Load the label font named in the configuration, logging when it is unusable
    pub fn from_config(config: &StreamConfig) -> Self {
        let font = match fs::read(&config.font_path) {
            Ok(data) => match Font::try_from_vec(data) {
                Some(font) => Some(font),
                None => {
                    warn!(
                        "Failed to parse font file '{}', labels disabled",
                        config.font_path
                    );
                    None
                }
            },
            Err(e) => {
                warn!(
                    "Failed to read font file '{}': {}, labels disabled",
                    config.font_path, e
                );
                None
            }
        };

        if font.is_some() {
            debug!(
                "Loaded label font {} at {}px",
                config.font_path, config.font_size
            );
        }

        Self::new(font, config.font_size)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every detection onto the image in place
    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
        for detection in detections {
            self.draw_detection(image, detection);
        }
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let bbox = detection.bbox;
        let color = label_color(&detection.dominant);

        for inset in 0..BOX_THICKNESS {
            let width = bbox.width - 2 * inset;
            let height = bbox.height - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, color);
        }

        let Some(font) = self.font.as_ref() else {
            return;
        };

        let text = label_text(detection);
        let (text_width, text_height) = text_size(self.scale, font, &text);
        if text_width <= 0 || text_height <= 0 {
            return;
        }

        let background_height = text_height + 2 * LABEL_PADDING;
        let label_y = (bbox.y - background_height).max(0);
        let background = Rect::at(bbox.x, label_y).of_size(
            (text_width + 2 * LABEL_PADDING) as u32,
            background_height as u32,
        );
        draw_filled_rect_mut(image, background, color);

        draw_text_mut(
            image,
            TEXT_COLOR,
            bbox.x + LABEL_PADDING,
            label_y + LABEL_PADDING,
            self.scale,
            font,
            &text,
        );
    }
}
