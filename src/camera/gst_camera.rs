use super::device::CameraDevice;
use crate::config::CameraConfig;
use crate::error::{CameraError, Result};
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use image::RgbImage;
use tracing::{debug, info, trace};

/// V4L2 camera read through a GStreamer pipeline ending in an RGB appsink
pub struct GstCamera {
    config: CameraConfig,
    pipeline: Option<Pipeline>,
    appsink: Option<AppSink>,
}

impl GstCamera {
    pub fn new(config: CameraConfig) -> Result<Self> {
        info!(
            "Initializing GStreamer camera for device {} ({}x{} @ {}fps, {})",
            config.index, config.resolution.0, config.resolution.1, config.fps, config.format
        );

        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self {
            config,
            pipeline: None,
            appsink: None,
        })
    }

    /// Build GStreamer pipeline string producing packed RGB frames
    fn build_pipeline_string(&self) -> String {
        let (width, height) = self.config.resolution;
        let fps = self.config.fps;

        let source_caps = match self.config.format.to_ascii_uppercase().as_str() {
            "YUYV" | "YUY2" => format!(
                "video/x-raw,format=YUY2,width={},height={},framerate={}/1",
                width, height, fps
            ),
            _ => format!(
                "image/jpeg,width={},height={},framerate={}/1 ! jpegdec",
                width, height, fps
            ),
        };

        format!(
            "v4l2src device=/dev/video{} io-mode=mmap ! {} ! videoconvert ! \
             video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=1 drop=true enable-last-sample=false",
            self.config.index, source_caps
        )
    }
}

impl CameraDevice for GstCamera {
    fn open(&mut self) -> Result<()> {
        let index = self.config.index;
        let pipeline_desc = self.build_pipeline_string();
        debug!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::DeviceOpen {
                index,
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink named 'sink'".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CameraError::DeviceOpen {
                index,
                details: format!("Failed to start pipeline: {}", e),
            }
            .into());
        }

        info!("Camera device {} opened", index);
        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage> {
        let appsink = self.appsink.as_ref().ok_or(CameraError::NotOpen)?;
        let read_timeout = self.config.read_timeout();
        let timeout = gstreamer::ClockTime::from_mseconds(read_timeout.as_millis() as u64);

        let sample = appsink
            .try_pull_sample(timeout)
            .ok_or_else(|| CameraError::CaptureStream {
                details: if appsink.is_eos() {
                    "End of stream".to_string()
                } else {
                    format!("No frame within {:?}", read_timeout)
                },
            })?;

        sample_to_image(&sample)
    }

    fn release(&mut self) {
        self.appsink = None;
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            debug!("Camera device {} released", self.config.index);
        }
    }

    fn is_open(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl Drop for GstCamera {
    fn drop(&mut self) {
        self.release();
    }
}

/// Copy an RGB sample into a tightly packed image, dropping row padding
fn sample_to_image(sample: &gstreamer::Sample) -> Result<RgbImage> {
    let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
        details: "No buffer in sample".to_string(),
    })?;

    let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
        details: "No caps in sample".to_string(),
    })?;

    let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
        details: format!("Failed to get video info: {}", e),
    })?;

    let width = video_info.width();
    let height = video_info.height();
    let stride = video_info.stride()[0] as usize;
    let row_bytes = width as usize * 3;

    let map = buffer
        .map_readable()
        .map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to map buffer: {}", e),
        })?;
    let data = map.as_slice();

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = data
            .get(start..start + row_bytes)
            .ok_or_else(|| CameraError::CaptureStream {
                details: format!("Buffer too small for {}x{} RGB frame", width, height),
            })?;
        pixels.extend_from_slice(line);
    }

    trace!("Captured {}x{} RGB frame ({} bytes)", width, height, map.len());

    RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        CameraError::CaptureStream {
            details: "Frame size does not match dimensions".to_string(),
        }
        .into()
    })
}
