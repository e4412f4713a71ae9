use super::encode::encode_jpeg;
use super::overlay::Annotator;
use super::server::ServerState;
use crate::error::{EmotionCamError, Result};
use crate::store::Snapshot;
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace};

/// Multipart boundary token used by `/video_feed`
pub const BOUNDARY: &str = "frame";

pub fn multipart_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", BOUNDARY)
}

/// Frame one JPEG as a single multipart part
pub fn frame_chunk(jpeg: &[u8]) -> Bytes {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut chunk = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    chunk.put_slice(header.as_bytes());
    chunk.put_slice(jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}

/// Annotate and encode a snapshot. `None` when no frame has been captured yet.
pub fn render_snapshot(
    snapshot: Snapshot,
    annotator: &Annotator,
    jpeg_quality: u8,
) -> Result<Option<Bytes>> {
    let Some(frame) = snapshot.frame else {
        return Ok(None);
    };

    let mut image = frame.to_image();
    annotator.annotate(&mut image, &snapshot.detections);
    let jpeg = encode_jpeg(&image, jpeg_quality)?;

    trace!(
        "Rendered frame {} with {} detections ({} bytes)",
        frame.id,
        snapshot.detections.len(),
        jpeg.len()
    );
    Ok(Some(frame_chunk(&jpeg)))
}

/// Per-client MJPEG generator.
///
/// Every tick copies the latest frame and detections, draws and encodes on
/// the blocking pool, and yields one multipart chunk. Ends once the shared
/// state stops running; dropping the stream (client disconnect) cancels it.
pub fn mjpeg_stream(state: ServerState) -> impl Stream<Item = std::result::Result<Bytes, axum::Error>> {
    async_stream::stream! {
        let mut ticker = interval(state.frame_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames_streamed = 0u64;
        let started = std::time::Instant::now();

        loop {
            ticker.tick().await;

            if !state.store.is_running() {
                debug!("Shared state stopped, ending MJPEG stream");
                break;
            }

            let snapshot = state.store.snapshot();
            if snapshot.frame.is_none() {
                trace!("No frame available for streaming");
                continue;
            }

            let annotator = Arc::clone(&state.annotator);
            let quality = state.jpeg_quality;
            let rendered = tokio::task::spawn_blocking(move || {
                render_snapshot(snapshot, &annotator, quality)
            })
            .await
            .map_err(|e| EmotionCamError::component("streaming", format!("Render task failed: {}", e)));

            match rendered {
                Ok(Ok(Some(chunk))) => {
                    frames_streamed += 1;
                    if frames_streamed.is_multiple_of(500) {
                        let fps = frames_streamed as f64 / started.elapsed().as_secs_f64();
                        info!("Streamed {} frames to client ({:.1} FPS)", frames_streamed, fps);
                    }
                    yield Ok::<_, axum::Error>(chunk);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) | Err(e) => {
                    error!("Failed to render frame for streaming: {}", e);
                }
            }
        }
    }
}
