use crate::{
    config::StreamConfig,
    error::{EmotionCamError, Result, StreamError},
    store::SharedState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

use super::handlers::{
    emotions_handler, health_handler, index_handler, toggle_ai_handler, video_feed_handler,
};
use super::overlay::Annotator;

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) store: Arc<SharedState>,
    pub(crate) annotator: Arc<Annotator>,
    pub(crate) frame_interval: Duration,
    pub(crate) jpeg_quality: u8,
    pub(crate) template_dir: PathBuf,
}

/// HTTP server for the annotated stream and the control API
pub struct StreamServer {
    pub(crate) config: StreamConfig,
    pub(crate) store: Arc<SharedState>,
    pub(crate) annotator: Arc<Annotator>,
}

impl StreamServer {
    pub fn new(config: StreamConfig, store: Arc<SharedState>, annotator: Annotator) -> Self {
        Self {
            config,
            store,
            annotator: Arc::new(annotator),
        }
    }

    /// Assemble the router with all routes and the static file service
    pub fn router(&self) -> Router {
        let state = ServerState {
            store: Arc::clone(&self.store),
            annotator: Arc::clone(&self.annotator),
            frame_interval: self.config.frame_interval(),
            jpeg_quality: self.config.jpeg_quality,
            template_dir: PathBuf::from(&self.config.template_dir),
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/video_feed", get(video_feed_handler))
            .route("/emotions", get(emotions_handler))
            .route("/toggle_ai", post(toggle_ai_handler))
            .route("/health", get(health_handler))
            .nest_service("/static", ServeDir::new(&self.config.static_dir))
            .with_state(state)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_address();

        info!("Starting HTTP server on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| StreamError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;

        info!("HTTP server listening on {}", addr);
        Ok(listener)
    }

    /// Serve on an already bound listener until `shutdown` is cancelled
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| StreamError::StartupFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}

/// Stream server builder for configuration
pub struct StreamServerBuilder {
    config: Option<StreamConfig>,
    store: Option<Arc<SharedState>>,
    annotator: Option<Annotator>,
}

impl StreamServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
            annotator: None,
        }
    }

    /// Set the stream configuration
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the shared state the handlers read from
    pub fn store(mut self, store: Arc<SharedState>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the annotator; by default it is built from the configured font
    pub fn annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = Some(annotator);
        self
    }

    pub fn build(self) -> Result<StreamServer> {
        let config = self.config.ok_or_else(|| {
            EmotionCamError::Stream(StreamError::StartupFailed {
                details: "Stream configuration is required".to_string(),
            })
        })?;

        let store = self.store.ok_or_else(|| {
            EmotionCamError::Stream(StreamError::StartupFailed {
                details: "Shared state is required".to_string(),
            })
        })?;

        let annotator = self
            .annotator
            .unwrap_or_else(|| Annotator::from_config(&config));

        Ok(StreamServer::new(config, store, annotator))
    }
}

impl Default for StreamServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
