use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmotionCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera device {index}: {details}")]
    DeviceOpen { index: u32, details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },

    #[error("Camera capture stream error: {details}")]
    CaptureStream { details: String },

    #[error("Camera device is not open")]
    NotOpen,
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to load model '{path}': {details}")]
    ModelLoad { path: String, details: String },

    #[error("Model inference failed: {details}")]
    Model { details: String },

    #[error("Unexpected model output: {details}")]
    Output { details: String },
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server startup failed: {details}")]
    StartupFailed { details: String },

    #[error("Frame encoding failed: {details}")]
    Encode { details: String },
}

impl EmotionCamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EmotionCamError>;
