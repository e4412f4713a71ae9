use crate::detection::Detection;
use crate::frame::Frame;
use image::RgbImage;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

/// Latest frame, latest detections and control flags shared by the camera
/// thread, the inference thread and every HTTP handler.
///
/// A single lock guards all fields. It is held only while a value is copied
/// in or out; callers never perform I/O, inference or encoding under it.
pub struct SharedState {
    inner: Mutex<StateInner>,
}

struct StateInner {
    frame: Option<Frame>,
    detections: Vec<Detection>,
    ai_active: bool,
    running: bool,
    next_frame_id: u64,
    detection_updates: u64,
}

/// Frame and detections copied out under one lock acquisition
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub frame: Option<Frame>,
    pub detections: Vec<Detection>,
}

/// Counters and flags reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub running: bool,
    pub active: bool,
    pub frame_available: bool,
    pub latest_frame_id: Option<u64>,
    pub frames_published: u64,
    pub detection_updates: u64,
    pub detections: usize,
}

impl SharedState {
    pub fn new(ai_active: bool) -> Self {
        debug!("Created shared state (inference enabled: {})", ai_active);
        Self {
            inner: Mutex::new(StateInner {
                frame: None,
                detections: Vec::new(),
                ai_active,
                running: true,
                next_frame_id: 1,
                detection_updates: 0,
            }),
        }
    }

    /// Publish a newly captured image, replacing the previous frame.
    ///
    /// Returns the id assigned to the frame.
    pub fn set_frame(&self, image: RgbImage) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_frame_id;
        inner.next_frame_id += 1;
        inner.frame = Some(Frame::new(id, image));
        id
    }

    pub fn get_frame_copy(&self) -> Option<Frame> {
        self.inner.lock().frame.clone()
    }

    /// Replace the whole detection list in one step
    pub fn set_detections(&self, detections: Vec<Detection>) {
        let mut inner = self.inner.lock();
        inner.detections = detections;
        inner.detection_updates += 1;
    }

    pub fn clear_detections(&self) {
        let mut inner = self.inner.lock();
        if !inner.detections.is_empty() {
            inner.detections.clear();
        }
    }

    pub fn get_detections_copy(&self) -> Vec<Detection> {
        self.inner.lock().detections.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        Snapshot {
            frame: inner.frame.clone(),
            detections: inner.detections.clone(),
        }
    }

    pub fn get_active(&self) -> bool {
        self.inner.lock().ai_active
    }

    pub fn set_active(&self, active: bool) {
        self.inner.lock().ai_active = active;
        info!("Emotion inference {}", if active { "enabled" } else { "disabled" });
    }

    /// Flip the inference flag and return the new value
    pub fn toggle_active(&self) -> bool {
        let active = {
            let mut inner = self.inner.lock();
            inner.ai_active = !inner.ai_active;
            inner.ai_active
        };
        info!("Emotion inference toggled {}", if active { "on" } else { "off" });
        active
    }

    /// Active flag and detection list read together
    pub fn emotions(&self) -> (bool, Vec<Detection>) {
        let inner = self.inner.lock();
        (inner.ai_active, inner.detections.clone())
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn stop(&self) {
        self.inner.lock().running = false;
        info!("Shared state marked as stopped");
    }

    pub fn status(&self) -> StoreStatus {
        let inner = self.inner.lock();
        StoreStatus {
            running: inner.running,
            active: inner.ai_active,
            frame_available: inner.frame.is_some(),
            latest_frame_id: inner.frame.as_ref().map(|f| f.id),
            frames_published: inner.next_frame_id - 1,
            detection_updates: inner.detection_updates,
            detections: inner.detections.len(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(true)
    }
}
