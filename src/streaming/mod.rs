mod encode;
mod handlers;
mod overlay;
mod publisher;
mod server;
#[cfg(test)]
mod tests;

pub use encode::encode_jpeg;
pub use handlers::{EmotionsResponse, ToggleResponse};
pub use overlay::{label_color, label_text, Annotator, ACCENT_COLOR, HAPPY_COLOR, NEGATIVE_COLOR};
pub use publisher::{frame_chunk, mjpeg_stream, multipart_content_type, render_snapshot, BOUNDARY};
pub use server::{ServerState, StreamServer, StreamServerBuilder};
