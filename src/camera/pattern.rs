use super::device::CameraDevice;
use crate::config::CameraConfig;
use crate::error::{CameraError, Result};
use image::{Rgb, RgbImage};
use std::time::Duration;
use tracing::{debug, trace};

/// Synthetic camera producing a gradient with a moving bar at the configured rate.
///
/// Used with `--mock-camera` and on builds without GStreamer.
pub struct TestPatternCamera {
    width: u32,
    height: u32,
    frame_interval: Duration,
    tick: u64,
    open: bool,
}

impl TestPatternCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::from_micros(1_000_000 / fps.max(1) as u64),
            tick: 0,
            open: false,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.resolution.0, config.resolution.1, config.fps)
    }

    fn render(&self) -> RgbImage {
        let bar_width = (self.width / 16).max(1);
        let bar_x = (self.tick as u32 * 4) % self.width.max(1);

        RgbImage::from_fn(self.width, self.height, |x, y| {
            if x >= bar_x && x < bar_x + bar_width {
                Rgb([240, 240, 240])
            } else {
                let r = (x * 255 / self.width.max(1)) as u8;
                let g = (y * 255 / self.height.max(1)) as u8;
                Rgb([r, g, 96])
            }
        })
    }
}

impl CameraDevice for TestPatternCamera {
    fn open(&mut self) -> Result<()> {
        debug!("Test pattern camera opened ({}x{})", self.width, self.height);
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage> {
        if !self.open {
            return Err(CameraError::NotOpen.into());
        }

        std::thread::sleep(self.frame_interval);
        self.tick = self.tick.wrapping_add(1);
        trace!("Generated test pattern frame {}", self.tick);
        Ok(self.render())
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
