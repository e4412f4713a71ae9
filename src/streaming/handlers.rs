use crate::detection::Detection;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::publisher::{mjpeg_stream, multipart_content_type};
use super::server::ServerState;

/// Body of `GET /emotions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionsResponse {
    pub active: bool,
    pub detections: Vec<Detection>,
}

/// Body of `POST /toggle_ai`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub status: String,
    pub active: bool,
}

/// Handler for the annotated MJPEG stream
pub async fn video_feed_handler(State(state): State<ServerState>) -> Response {
    info!("New MJPEG stream client connected");

    (
        [
            (header::CONTENT_TYPE, multipart_content_type()),
            (header::CACHE_CONTROL, "no-cache, private".to_string()),
            (header::PRAGMA, "no-cache".to_string()),
        ],
        Body::from_stream(mjpeg_stream(state)),
    )
        .into_response()
}

/// Current detections and the inference flag, read in one snapshot
pub async fn emotions_handler(State(state): State<ServerState>) -> Json<EmotionsResponse> {
    let (active, detections) = state.store.emotions();
    Json(EmotionsResponse { active, detections })
}

/// Flip inference on or off and report the new flag
pub async fn toggle_ai_handler(State(state): State<ServerState>) -> Json<ToggleResponse> {
    let active = state.store.toggle_active();
    Json(ToggleResponse {
        status: "ok".to_string(),
        active,
    })
}

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let status = state.store.status();

    let health_info = serde_json::json!({
        "status": if status.running { "healthy" } else { "stopping" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "running": status.running,
        "active": status.active,
        "frame_available": status.frame_available,
        "latest_frame_id": status.latest_frame_id,
        "frames_published": status.frames_published,
        "detection_updates": status.detection_updates,
        "detections": status.detections,
    });

    (StatusCode::OK, Json(health_info))
}

/// Viewer page: `index.html` from the template directory, or a built-in page
pub async fn index_handler(State(state): State<ServerState>) -> Html<String> {
    let path = state.template_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page),
        Err(e) => {
            debug!(
                "No template at {} ({}), serving built-in page",
                path.display(),
                e
            );
            Html(BUILTIN_INDEX.to_string())
        }
    }
}

const BUILTIN_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Emotion Camera</title>
    <style>
        :root { color-scheme: dark; }
        body {
            margin: 0;
            background: #0b0f14;
            color: #e5e7eb;
            font-family: sans-serif;
            display: flex;
            flex-direction: column;
            align-items: center;
            gap: 12px;
            padding: 16px;
        }
        img.stream { max-width: 100%; height: auto; background: #000; }
        pre { min-width: 320px; background: #111827; padding: 8px; }
    </style>
</head>
<body>
    <img class="stream" src="/video_feed" alt="Emotion camera stream">
    <button id="toggle">Toggle AI</button>
    <pre id="emotions">waiting for detections...</pre>
    <script>
        const out = document.getElementById("emotions");
        document.getElementById("toggle").onclick = async () => {
            await fetch("/toggle_ai", { method: "POST" });
        };
        setInterval(async () => {
            const res = await fetch("/emotions");
            out.textContent = JSON.stringify(await res.json(), null, 2);
        }, 500);
    </script>
</body>
</html>
"#;
