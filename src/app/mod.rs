mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::EmotionCamOrchestrator;
pub use types::{ComponentState, ShutdownHandle, ShutdownReason};
