use super::detector::{DetectorFactory, EmotionDetector};
use crate::config::InferenceConfig;
use crate::detection::ExclusionPolicy;
use crate::error::{EmotionCamError, Result};
use crate::store::SharedState;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// What the inference loop did on a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceState {
    /// Inference switched off; detections cleared
    Disabled,
    /// Enabled but no frame has been captured yet
    Polling,
    /// The detector ran against the latest frame
    Running,
}

impl fmt::Display for InferenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InferenceState::Disabled => "disabled",
            InferenceState::Polling => "polling",
            InferenceState::Running => "running",
        };
        f.write_str(name)
    }
}

/// Loop timing and post-processing derived from [`InferenceConfig`]
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub policy: ExclusionPolicy,
    pub cycle_interval: Duration,
    pub disabled_interval: Duration,
    pub slow_inference_warn: Duration,
}

impl From<&InferenceConfig> for InferenceSettings {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            policy: ExclusionPolicy::new(config.excluded_emotions.iter().cloned()),
            cycle_interval: config.cycle_interval(),
            disabled_interval: config.disabled_interval(),
            slow_inference_warn: config.slow_inference_warn(),
        }
    }
}

/// Counters collected by an inference loop run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceStats {
    pub cycles: u64,
    pub inferences: u64,
    pub failures: u64,
}

/// Background thread turning the latest frame into detections
pub struct InferenceLoop {
    settings: InferenceSettings,
    state: Arc<SharedState>,
    handle: Option<JoinHandle<InferenceStats>>,
    ready: Option<oneshot::Receiver<std::result::Result<(), String>>>,
}

impl InferenceLoop {
    pub fn new(settings: InferenceSettings, state: Arc<SharedState>) -> Self {
        Self {
            settings,
            state,
            handle: None,
            ready: None,
        }
    }

    /// Spawn the inference thread. The detector is built on that thread; if
    /// construction fails the thread logs the error and exits.
    pub fn start(&mut self, factory: DetectorFactory) -> Result<()> {
        if self.handle.is_some() {
            warn!("Inference loop is already running");
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let settings = self.settings.clone();
        let (ready_tx, ready_rx) = oneshot::channel();

        let handle = thread::Builder::new()
            .name("inference".to_string())
            .spawn(move || {
                info!("Initializing emotion detector");
                let mut detector = match factory() {
                    Ok(detector) => detector,
                    Err(e) => {
                        error!("Emotion detector failed to initialize: {}; serving unannotated video", e);
                        let _ = ready_tx.send(Err(e.to_string()));
                        return InferenceStats::default();
                    }
                };
                info!("Emotion detector ready");
                let _ = ready_tx.send(Ok(()));

                let stats = run_inference_loop(detector.as_mut(), &state, &settings);
                info!(
                    "Inference thread stopped ({} inferences, {} failures)",
                    stats.inferences, stats.failures
                );
                stats
            })
            .map_err(|e| {
                EmotionCamError::component("inference", format!("Failed to spawn thread: {}", e))
            })?;

        self.handle = Some(handle);
        self.ready = Some(ready_rx);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Resolves once the detector is built (`Ok`) or failed to load (`Err`
    /// with the reason). Available once per started thread.
    pub fn take_ready(&mut self) -> Option<oneshot::Receiver<std::result::Result<(), String>>> {
        self.ready.take()
    }

    /// Take the thread handle so the caller can join it
    pub fn take_handle(&mut self) -> Option<JoinHandle<InferenceStats>> {
        self.handle.take()
    }
}

/// Run cycles until the running flag clears, sleeping per the cycle outcome
pub(crate) fn run_inference_loop(
    detector: &mut dyn EmotionDetector,
    state: &SharedState,
    settings: &InferenceSettings,
) -> InferenceStats {
    let mut stats = InferenceStats::default();
    let mut previous: Option<InferenceState> = None;

    while state.is_running() {
        let current = run_cycle(detector, state, settings, &mut stats);

        if previous != Some(current) {
            debug!("Inference state: {}", current);
            previous = Some(current);
        }

        let pause = match current {
            InferenceState::Disabled => settings.disabled_interval,
            InferenceState::Polling | InferenceState::Running => settings.cycle_interval,
        };
        thread::sleep(pause);
    }

    stats
}

/// One pass of the inference state machine
pub(crate) fn run_cycle(
    detector: &mut dyn EmotionDetector,
    state: &SharedState,
    settings: &InferenceSettings,
    stats: &mut InferenceStats,
) -> InferenceState {
    stats.cycles += 1;

    if !state.get_active() {
        state.clear_detections();
        return InferenceState::Disabled;
    }

    let frame = match state.get_frame_copy() {
        Some(frame) => frame,
        None => {
            trace!("No frame available for inference yet");
            return InferenceState::Polling;
        }
    };

    let started = Instant::now();
    let result = detector.detect(frame.image());
    let elapsed = started.elapsed();

    if elapsed > settings.slow_inference_warn {
        warn!("Inference on frame {} took {:?}", frame.id, elapsed);
    }

    match result {
        Ok(faces) => {
            let detections = settings.policy.apply_all(faces);
            trace!(
                "Frame {}: {} faces in {:?}",
                frame.id,
                detections.len(),
                elapsed
            );
            state.set_detections(detections);
            stats.inferences += 1;
        }
        Err(e) => {
            stats.failures += 1;
            error!("Emotion detection failed on frame {}: {}", frame.id, e);
        }
    }

    InferenceState::Running
}
