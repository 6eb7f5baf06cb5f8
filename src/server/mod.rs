//! HTTP surface wiring requests to the orchestrator and the flashcard pipeline.

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;

use crate::config::Config;
use crate::flashcards::FlashcardPipeline;
use crate::orchestrator::{HybridOrchestrator, WatchPageMetadata};
use crate::sources;
use crate::sources::delegated::CLIENT_FETCH_URL;
use crate::Result;

/// Shared, immutable state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<HybridOrchestrator>,
    pub flashcards: Arc<FlashcardPipeline>,
    pub html_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(orchestrator: HybridOrchestrator, flashcards: FlashcardPipeline) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            flashcards: Arc::new(flashcards),
            html_path: None,
        }
    }

    pub fn with_html(mut self, html_path: Option<PathBuf>) -> Self {
        self.html_path = html_path;
        self
    }

    /// Wire the production collaborators described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = sources::from_config(config)?;
        let metadata = WatchPageMetadata::new(Duration::from_secs(config.youtube.request_timeout_secs))?;

        let orchestrator = HybridOrchestrator::new(source, config.youtube.languages.clone())
            .with_metadata(Arc::new(metadata));
        let flashcards = FlashcardPipeline::from_config(&config.generation)?;

        Ok(Self::new(orchestrator, flashcards).with_html(config.server.html_path.clone()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/hermes.html", get(handlers::index))
        .route("/api/transcript", post(handlers::transcript_by_url))
        .route("/api/transcript/:video_id", get(handlers::transcript_by_id))
        .route("/api/flashcards", post(handlers::flashcards))
        .route("/api/save-transcript", post(handlers::save_transcript))
        .route(CLIENT_FETCH_URL, get(handlers::client_fetch))
        .route("/api/get-fetcher-code", get(handlers::fetcher_code))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is interrupted
pub async fn run(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Hermes server running on http://{}", addr);
    if !state.flashcards.is_enabled() {
        tracing::info!("Flashcard endpoint will report that generation is not configured");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
