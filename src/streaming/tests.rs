use super::*;
use crate::config::StreamConfig;
use crate::detection::{BoundingBox, Detection, ExclusionPolicy, RawFace};
use crate::store::SharedState;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use futures::StreamExt;
use image::{Rgb, RgbImage};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> StreamConfig {
    StreamConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        frame_interval_ms: 5,
        template_dir: "does-not-exist".to_string(),
        static_dir: "does-not-exist".to_string(),
        ..Default::default()
    }
}

fn detection(dominant: &str, score: Option<f32>, x: i32) -> Detection {
    let mut emotions = BTreeMap::new();
    if let Some(score) = score {
        emotions.insert(dominant.to_string(), score);
    }
    Detection {
        bbox: BoundingBox::new(x, 8, 24, 24),
        emotions,
        dominant: dominant.to_string(),
    }
}

fn server_for(store: Arc<SharedState>) -> StreamServer {
    StreamServerBuilder::new()
        .config(test_config())
        .store(store)
        .annotator(Annotator::new(None, 20.0))
        .build()
        .unwrap()
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

fn assert_well_formed_chunk(chunk: &[u8]) {
    let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    assert!(chunk.starts_with(header));
    assert!(chunk.ends_with(b"\r\n"));
    assert_eq!(count_occurrences(chunk, b"--frame"), 1);
    assert_eq!(count_occurrences(chunk, b"Content-Type:"), 1);

    let jpeg = &chunk[header.len()..chunk.len() - 2];
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
}

#[test]
fn test_label_color_policy() {
    assert_eq!(label_color("happy"), HAPPY_COLOR);
    assert_eq!(label_color("angry"), NEGATIVE_COLOR);
    assert_eq!(label_color("disgust"), NEGATIVE_COLOR);
    assert_eq!(label_color("sad"), ACCENT_COLOR);
    assert_eq!(label_color("surprise"), ACCENT_COLOR);
    assert_eq!(label_color("unknown"), ACCENT_COLOR);
}

#[test]
fn test_label_text() {
    assert_eq!(label_text(&detection("happy", Some(0.876), 0)), "HAPPY 87%");
    assert_eq!(label_text(&detection("sad", Some(1.0), 0)), "SAD 100%");
    assert_eq!(label_text(&detection("unknown", None, 0)), "UNKNOWN");
}

#[test]
fn test_annotator_draws_box_in_label_color() {
    let mut image = RgbImage::from_pixel(64, 48, Rgb([0, 0, 0]));
    let annotator = Annotator::new(None, 20.0);

    annotator.annotate(
        &mut image,
        &[detection("happy", Some(0.9), 4), detection("angry", Some(0.8), 34)],
    );

    assert_eq!(image.get_pixel(4, 8), &HAPPY_COLOR);
    assert_eq!(image.get_pixel(5, 9), &HAPPY_COLOR);
    assert_eq!(image.get_pixel(34, 8), &NEGATIVE_COLOR);
    // interior untouched
    assert_eq!(image.get_pixel(16, 20), &Rgb([0, 0, 0]));
}

#[test]
fn test_annotator_tolerates_out_of_frame_boxes() {
    let mut image = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
    let annotator = Annotator::new(None, 20.0);

    let mut degenerate = detection("sad", Some(0.5), -10);
    degenerate.bbox = BoundingBox::new(-10, -10, 0, 5);
    annotator.annotate(&mut image, &[detection("sad", Some(0.5), 10), degenerate]);
}

#[test]
fn test_missing_font_disables_labels() {
    let config = StreamConfig {
        font_path: "no/such/font.ttf".to_string(),
        ..test_config()
    };
    assert!(!Annotator::from_config(&config).has_font());
}

#[test]
fn test_encode_jpeg_markers() {
    let image = RgbImage::from_pixel(32, 24, Rgb([120, 60, 30]));
    let jpeg = encode_jpeg(&image, 80).unwrap();

    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
}

#[test]
fn test_render_snapshot_without_frame() {
    let store = SharedState::default();
    let chunk = render_snapshot(store.snapshot(), &Annotator::new(None, 20.0), 80).unwrap();
    assert!(chunk.is_none());
}

#[test]
fn test_render_snapshot_single_boundary_regardless_of_detections() {
    let store = SharedState::default();
    store.set_frame(RgbImage::from_pixel(64, 48, Rgb([200, 200, 200])));
    let annotator = Annotator::new(None, 20.0);

    let bare = render_snapshot(store.snapshot(), &annotator, 80).unwrap().unwrap();
    assert_well_formed_chunk(&bare);

    store.set_detections(
        (0..5)
            .map(|i| detection("happy", Some(0.9), i * 8))
            .collect(),
    );
    let annotated = render_snapshot(store.snapshot(), &annotator, 80).unwrap().unwrap();
    assert_well_formed_chunk(&annotated);
}

#[test]
fn test_render_does_not_modify_stored_frame() {
    let store = SharedState::default();
    store.set_frame(RgbImage::from_pixel(64, 48, Rgb([0, 0, 0])));
    store.set_detections(vec![detection("happy", Some(0.9), 4)]);

    render_snapshot(store.snapshot(), &Annotator::new(None, 20.0), 80).unwrap();

    let frame = store.get_frame_copy().unwrap();
    assert_eq!(frame.image().get_pixel(4, 8), &Rgb([0, 0, 0]));
}

#[test]
fn test_builder_validation() {
    let result = StreamServerBuilder::new()
        .store(Arc::new(SharedState::default()))
        .build();
    assert!(result.is_err());

    let result = StreamServerBuilder::new().config(test_config()).build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_emotions_endpoint() {
    let store = Arc::new(SharedState::default());
    let policy = ExclusionPolicy::new(["neutral", "fear"]);
    store.set_detections(vec![policy.apply(RawFace {
        bbox: BoundingBox::new(1, 2, 3, 4),
        emotions: [("happy", 0.1), ("neutral", 0.6), ("fear", 0.1), ("sad", 0.2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    })]);

    let response = server_for(Arc::clone(&store))
        .router()
        .oneshot(Request::builder().uri("/emotions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["active"], true);
    let first = &json["detections"][0];
    assert_eq!(first["box"], serde_json::json!([1, 2, 3, 4]));
    assert_eq!(first["dominant"], "sad");
    assert!(first["emotions"].get("neutral").is_none());
    assert_eq!(first["emotions"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_toggle_ai_endpoint_flips_flag() {
    let store = Arc::new(SharedState::default());
    let router = server_for(Arc::clone(&store)).router();

    let toggle = || {
        Request::builder()
            .method(Method::POST)
            .uri("/toggle_ai")
            .body(Body::empty())
            .unwrap()
    };

    let response = router.clone().oneshot(toggle()).await.unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let reply: ToggleResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(reply.status, "ok");
    assert!(!reply.active);
    assert!(!store.get_active());

    let response = router.oneshot(toggle()).await.unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let reply: ToggleResponse = serde_json::from_slice(&body).unwrap();
    assert!(reply.active);
    assert!(store.get_active());
}

#[tokio::test]
async fn test_toggle_requires_post() {
    let router = server_for(Arc::new(SharedState::default())).router();
    let response = router
        .oneshot(Request::builder().uri("/toggle_ai").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_endpoint() {
    let store = Arc::new(SharedState::default());
    store.set_frame(RgbImage::new(4, 4));

    let response = server_for(store)
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "healthy");
    assert_eq!(json["frame_available"], true);
    assert_eq!(json["latest_frame_id"], 1);
    assert_eq!(json["frames_published"], 1);
}

#[tokio::test]
async fn test_index_falls_back_to_builtin_page() {
    let response = server_for(Arc::new(SharedState::default()))
        .router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("/video_feed"));
}

#[tokio::test]
async fn test_index_serves_template_and_static_files() {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    let assets = dir.path().join("static");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(templates.join("index.html"), "<h1>custom viewer</h1>").unwrap();
    std::fs::write(assets.join("app.js"), "console.log('hi');").unwrap();

    let config = StreamConfig {
        template_dir: templates.to_string_lossy().into_owned(),
        static_dir: assets.to_string_lossy().into_owned(),
        ..test_config()
    };
    let router = StreamServerBuilder::new()
        .config(config)
        .store(Arc::new(SharedState::default()))
        .annotator(Annotator::new(None, 20.0))
        .build()
        .unwrap()
        .router();

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<h1>custom viewer</h1>");

    let response = router
        .oneshot(Request::builder().uri("/static/app.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"console.log('hi');");
}

#[tokio::test]
async fn test_video_feed_emits_multipart_chunks() {
    let store = Arc::new(SharedState::default());
    store.set_frame(RgbImage::from_pixel(64, 48, Rgb([10, 120, 200])));
    store.set_detections(vec![detection("angry", Some(0.7), 4), detection("happy", Some(0.6), 30)]);

    let response = server_for(Arc::clone(&store))
        .router()
        .oneshot(Request::builder().uri("/video_feed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut chunks = response.into_body().into_data_stream();
    for _ in 0..2 {
        let chunk = tokio::time::timeout(Duration::from_secs(5), chunks.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_well_formed_chunk(&chunk);
    }
}

#[tokio::test]
async fn test_video_feed_waits_for_first_frame() {
    let store = Arc::new(SharedState::default());
    let response = server_for(Arc::clone(&store))
        .router()
        .oneshot(Request::builder().uri("/video_feed").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let mut chunks = response.into_body().into_data_stream();

    let pending = tokio::time::timeout(Duration::from_millis(50), chunks.next()).await;
    assert!(pending.is_err());

    store.set_frame(RgbImage::new(16, 16));
    let chunk = tokio::time::timeout(Duration::from_secs(5), chunks.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_well_formed_chunk(&chunk);
}

#[tokio::test]
async fn test_video_feed_ends_when_stopped() {
    let store = Arc::new(SharedState::default());
    store.set_frame(RgbImage::new(8, 8));
    store.stop();

    let response = server_for(store)
        .router()
        .oneshot(Request::builder().uri("/video_feed").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = tokio::time::timeout(Duration::from_secs(5), to_bytes(response.into_body(), usize::MAX))
        .await
        .unwrap()
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_server_shuts_down_on_cancel() {
    let server = server_for(Arc::new(SharedState::default()));
    let token = tokio_util::sync::CancellationToken::new();
    let cancel = token.clone();

    let handle = tokio::spawn(async move { server.start(token).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
