use super::worker::run_capture_loop;
use super::*;
use crate::error::CameraError;
use crate::store::SharedState;
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

enum Step {
    Frame(u8),
    Fail,
}

/// Plays back a fixed script of reads, then stops the shared state
struct ScriptedCamera {
    script: VecDeque<Step>,
    state: Arc<SharedState>,
    fail_first_open: bool,
    opened: bool,
    opens: usize,
    releases: usize,
}

impl ScriptedCamera {
    fn new(state: Arc<SharedState>, script: Vec<Step>) -> Self {
        Self {
            script: script.into(),
            state,
            fail_first_open: false,
            opened: false,
            opens: 0,
            releases: 0,
        }
    }
}

impl CameraDevice for ScriptedCamera {
    fn open(&mut self) -> crate::error::Result<()> {
        self.opens += 1;
        if self.fail_first_open && self.opens == 1 {
            return Err(CameraError::DeviceOpen {
                index: 0,
                details: "busy".to_string(),
            }
            .into());
        }
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> crate::error::Result<RgbImage> {
        if !self.opened {
            return Err(CameraError::NotOpen.into());
        }
        match self.script.pop_front() {
            Some(Step::Frame(shade)) => Ok(RgbImage::from_pixel(4, 4, Rgb([shade, shade, shade]))),
            Some(Step::Fail) => Err(CameraError::CaptureStream {
                details: "read failed".to_string(),
            }
            .into()),
            None => {
                self.state.stop();
                Err(CameraError::CaptureStream {
                    details: "script finished".to_string(),
                }
                .into())
            }
        }
    }

    fn release(&mut self) {
        self.opened = false;
        self.releases += 1;
    }

    fn is_open(&self) -> bool {
        self.opened
    }
}

#[test]
fn test_capture_resumes_after_read_failure() {
    let state = Arc::new(SharedState::default());
    let mut camera = ScriptedCamera::new(
        Arc::clone(&state),
        vec![Step::Frame(10), Step::Fail, Step::Frame(20), Step::Frame(30)],
    );

    let stats = run_capture_loop(&mut camera, &state, Duration::ZERO, Duration::ZERO);

    assert_eq!(stats.frames_captured, 3);
    assert_eq!(stats.read_failures, 2);
    assert_eq!(stats.reopen_attempts, 1);

    let frame = state.get_frame_copy().unwrap();
    assert_eq!(frame.id, 3);
    assert_eq!(frame.image().get_pixel(0, 0), &Rgb([30, 30, 30]));
    assert!(!camera.is_open());
}

#[test]
fn test_capture_recovers_from_initial_open_failure() {
    let state = Arc::new(SharedState::default());
    let mut camera = ScriptedCamera::new(Arc::clone(&state), vec![Step::Frame(5)]);
    camera.fail_first_open = true;

    let stats = run_capture_loop(&mut camera, &state, Duration::ZERO, Duration::ZERO);

    assert_eq!(stats.frames_captured, 1);
    assert_eq!(camera.opens, 2);
    assert!(state.get_frame_copy().is_some());
}

#[test]
fn test_capture_loop_exits_when_stopped() {
    let state = Arc::new(SharedState::default());
    state.stop();
    let mut camera = ScriptedCamera::new(Arc::clone(&state), vec![Step::Frame(1)]);

    let stats = run_capture_loop(&mut camera, &state, Duration::ZERO, Duration::ZERO);

    assert_eq!(stats, CaptureStats::default());
    assert!(state.get_frame_copy().is_none());
    assert_eq!(camera.releases, 1);
}

#[test]
fn test_frame_source_thread_publishes_frames() {
    let state = Arc::new(SharedState::default());
    let config = crate::config::CameraConfig {
        resolution: (32, 24),
        fps: 200,
        read_interval_ms: 0,
        ..Default::default()
    };

    let mut source = FrameSource::new(config.clone(), Arc::clone(&state));
    source
        .start(Box::new(TestPatternCamera::from_config(&config)))
        .unwrap();
    assert!(source.is_started());

    let deadline = Instant::now() + Duration::from_secs(2);
    while state.get_frame_copy().is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    state.stop();
    let stats = source.take_handle().unwrap().join().unwrap();

    assert!(stats.frames_captured >= 1);
    let frame = state.get_frame_copy().unwrap();
    assert_eq!((frame.width(), frame.height()), (32, 24));
}

#[test]
fn test_pattern_camera_requires_open() {
    let mut camera = TestPatternCamera::new(8, 8, 1000);
    assert!(camera.read().is_err());

    camera.open().unwrap();
    assert!(camera.is_open());
    let image = camera.read().unwrap();
    assert_eq!(image.dimensions(), (8, 8));

    camera.release();
    assert!(!camera.is_open());
}

#[test]
fn test_create_mock_camera_device() {
    let config = crate::config::CameraConfig::default();
    let device = create_camera_device(&config, true).unwrap();
    assert!(!device.is_open());
}
