use super::device::CameraDevice;
use crate::config::CameraConfig;
use crate::error::{EmotionCamError, Result};
use crate::store::SharedState;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Counters collected by a capture loop run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub read_failures: u64,
    pub reopen_attempts: u64,
}

/// Background thread that keeps the shared state fed with the newest camera frame
pub struct FrameSource {
    config: CameraConfig,
    state: Arc<SharedState>,
    handle: Option<JoinHandle<CaptureStats>>,
}

impl FrameSource {
    pub fn new(config: CameraConfig, state: Arc<SharedState>) -> Self {
        Self {
            config,
            state,
            handle: None,
        }
    }

    /// Spawn the capture thread; it owns `device` until it exits
    pub fn start(&mut self, device: Box<dyn CameraDevice>) -> Result<()> {
        if self.handle.is_some() {
            warn!("Frame source is already running");
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let reconnect_delay = self.config.reconnect_delay();
        let read_interval = self.config.read_interval();
        let index = self.config.index;

        let handle = thread::Builder::new()
            .name("camera".to_string())
            .spawn(move || {
                let mut device = device;
                info!("Camera capture thread started for device {}", index);
                let stats =
                    run_capture_loop(device.as_mut(), &state, reconnect_delay, read_interval);
                info!(
                    "Camera capture thread stopped ({} frames, {} read failures, {} reopens)",
                    stats.frames_captured, stats.read_failures, stats.reopen_attempts
                );
                stats
            })
            .map_err(|e| {
                EmotionCamError::component("camera", format!("Failed to spawn thread: {}", e))
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Take the thread handle so the caller can join it
    pub fn take_handle(&mut self) -> Option<JoinHandle<CaptureStats>> {
        self.handle.take()
    }
}

/// Read frames until the running flag clears.
///
/// A failed read releases the device, waits `reconnect_delay`, and reopens it.
/// A failed open is treated the same way on the next iteration.
pub(crate) fn run_capture_loop(
    device: &mut dyn CameraDevice,
    state: &SharedState,
    reconnect_delay: Duration,
    read_interval: Duration,
) -> CaptureStats {
    let mut stats = CaptureStats::default();

    if let Err(e) = device.open() {
        error!("Could not open camera: {}", e);
    }

    while state.is_running() {
        match device.read() {
            Ok(image) => {
                let id = state.set_frame(image);
                stats.frames_captured += 1;
                trace!("Published frame {}", id);

                if !read_interval.is_zero() {
                    thread::sleep(read_interval);
                }
            }
            Err(e) => {
                stats.read_failures += 1;
                warn!("Camera read failed: {}; reopening in {:?}", e, reconnect_delay);

                device.release();
                thread::sleep(reconnect_delay);

                if !state.is_running() {
                    break;
                }

                stats.reopen_attempts += 1;
                match device.open() {
                    Ok(()) => debug!("Camera reopened"),
                    Err(e) => warn!("Camera reopen failed: {}", e),
                }
            }
        }
    }

    device.release();
    stats
}
