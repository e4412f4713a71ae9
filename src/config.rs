use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EmotionCamConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Video format delivered by the device (MJPG or YUYV)
    #[serde(default = "default_camera_format")]
    pub format: String,

    /// Delay before reopening the device after a failed read
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Pause between successful reads
    #[serde(default = "default_read_interval_ms")]
    pub read_interval_ms: u64,

    /// How long a single read may wait for a frame before it counts as a failure
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InferenceConfig {
    /// Whether emotion inference runs when the process starts
    #[serde(default = "default_enabled_on_start")]
    pub enabled_on_start: bool,

    /// Emotion labels removed from every detection before the dominant label is chosen
    #[serde(default = "default_excluded_emotions")]
    pub excluded_emotions: Vec<String>,

    /// Sleep between inference cycles
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Sleep between checks while inference is disabled
    #[serde(default = "default_disabled_interval_ms")]
    pub disabled_interval_ms: u64,

    /// Inference calls slower than this are logged as warnings
    #[serde(default = "default_slow_inference_warn_ms")]
    pub slow_inference_warn_ms: u64,

    /// ONNX face detector (UltraFace layout)
    #[serde(default = "default_face_model_path")]
    pub face_model_path: String,

    /// ONNX emotion classifier
    #[serde(default = "default_emotion_model_path")]
    pub emotion_model_path: String,

    /// Face detector input (width, height)
    #[serde(default = "default_face_input_size")]
    pub face_input_size: (u32, u32),

    /// Square side of the grayscale face crop fed to the classifier
    #[serde(default = "default_emotion_input_size")]
    pub emotion_input_size: u32,

    /// Minimum face score kept after detection
    #[serde(default = "default_face_confidence")]
    pub face_confidence: f32,

    /// IoU above which overlapping faces are suppressed
    #[serde(default = "default_nms_iou_threshold")]
    pub nms_iou_threshold: f32,

    /// Classifier output order
    #[serde(default = "default_emotion_labels")]
    pub emotion_labels: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// IP address to bind to
    #[serde(default = "default_stream_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Pause between MJPEG chunks for each client
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// TrueType font used for detection labels
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Label font size in pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Directory holding index.html
    #[serde(default = "default_template_dir")]
    pub template_dir: String,

    /// Directory served under /static
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl EmotionCamConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&EmotionCamConfig::default())?)
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // EMOTIONCAM_STREAM__PORT=9000, EMOTIONCAM_INFERENCE__EXCLUDED_EMOTIONS=neutral,fear
            .add_source(
                Environment::with_prefix("EMOTIONCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("inference.excluded_emotions")
                    .with_list_parse_key("inference.emotion_labels"),
            )
            .build()?;

        let config: EmotionCamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.camera.read_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera read_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.inference.cycle_interval_ms == 0 || self.inference.disabled_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Inference intervals must be greater than 0".to_string(),
            ));
        }

        if self.inference.emotion_labels.is_empty() {
            return Err(ConfigError::Message(
                "Inference emotion_labels must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.inference.face_confidence) {
            return Err(ConfigError::Message(
                "Inference face_confidence must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.inference.nms_iou_threshold) {
            return Err(ConfigError::Message(
                "Inference nms_iou_threshold must be within [0, 1]".to_string(),
            ));
        }

        if self.inference.face_input_size.0 == 0
            || self.inference.face_input_size.1 == 0
            || self.inference.emotion_input_size == 0
        {
            return Err(ConfigError::Message(
                "Model input sizes must be greater than 0".to_string(),
            ));
        }

        if self.stream.frame_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Stream frame_interval_ms must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(ConfigError::Message(
                "Stream jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

impl CameraConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl InferenceConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn disabled_interval(&self) -> Duration {
        Duration::from_millis(self.disabled_interval_ms)
    }

    pub fn slow_inference_warn(&self) -> Duration {
        Duration::from_millis(self.slow_inference_warn_ms)
    }
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: default_camera_index(),
            resolution: default_camera_resolution(),
            fps: default_camera_fps(),
            format: default_camera_format(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            read_interval_ms: default_read_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled_on_start: default_enabled_on_start(),
            excluded_emotions: default_excluded_emotions(),
            cycle_interval_ms: default_cycle_interval_ms(),
            disabled_interval_ms: default_disabled_interval_ms(),
            slow_inference_warn_ms: default_slow_inference_warn_ms(),
            face_model_path: default_face_model_path(),
            emotion_model_path: default_emotion_model_path(),
            face_input_size: default_face_input_size(),
            emotion_input_size: default_emotion_input_size(),
            face_confidence: default_face_confidence(),
            nms_iou_threshold: default_nms_iou_threshold(),
            emotion_labels: default_emotion_labels(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ip: default_stream_ip(),
            port: default_stream_port(),
            frame_interval_ms: default_frame_interval_ms(),
            jpeg_quality: default_jpeg_quality(),
            font_path: default_font_path(),
            font_size: default_font_size(),
            template_dir: default_template_dir(),
            static_dir: default_static_dir(),
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_format() -> String {
    "MJPG".to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_read_interval_ms() -> u64 {
    10
}
fn default_read_timeout_ms() -> u64 {
    2000
}

fn default_enabled_on_start() -> bool {
    true
}
fn default_excluded_emotions() -> Vec<String> {
    vec!["neutral".to_string(), "fear".to_string()]
}
fn default_cycle_interval_ms() -> u64 {
    100
}
fn default_disabled_interval_ms() -> u64 {
    500
}
fn default_slow_inference_warn_ms() -> u64 {
    1000
}
fn default_face_model_path() -> String {
    "models/version-RFB-320.onnx".to_string()
}
fn default_emotion_model_path() -> String {
    "models/emotion-fer.onnx".to_string()
}
fn default_face_input_size() -> (u32, u32) {
    (320, 240)
}
fn default_emotion_input_size() -> u32 {
    64
}
fn default_face_confidence() -> f32 {
    0.7
}
fn default_nms_iou_threshold() -> f32 {
    0.3
}
fn default_emotion_labels() -> Vec<String> {
    ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"]
        .iter()
        .map(|label| label.to_string())
        .collect()
}

fn default_stream_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_port() -> u16 {
    8000
}
fn default_frame_interval_ms() -> u64 {
    40
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    20.0
}
fn default_template_dir() -> String {
    "templates".to_string()
}
fn default_static_dir() -> String {
    "static".to_string()
}
