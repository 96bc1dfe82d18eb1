mod error;
mod handlers;
pub mod protocol;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::models::{Config, DEFAULT_MAX_UPLOAD_BYTES};
use crate::services::{MetricsStore, Operation, RagPipeline};

pub use error::ApiError;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub metrics: Option<Arc<MetricsStore>>,
    pub upload_dir: Option<PathBuf>,
    pub max_upload_bytes: u64,
    /// Browser origins allowed by CORS; empty allows any.
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            pipeline,
            metrics: None,
            upload_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origins: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsStore>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_upload_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.upload_dir = dir;
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    fn record(&self, operation: Operation, started: Instant, success: bool) {
        if let Some(ref metrics) = self.metrics {
            metrics.record(operation, started.elapsed().as_millis() as u64, success);
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("cors_origins", &self.cors_origins)
            .finish_non_exhaustive()
    }
}

pub fn router(state: AppState) -> Router {
    // Leave room for the multipart framing around the file itself.
    let body_limit = usize::try_from(state.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(64 * 1024);

    let cors = cors_layer(&state.cors_origins);

    // Browser clients call the slash-terminated paths.
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/health/", get(handlers::health))
        .route("/api/upload", post(handlers::upload))
        .route("/api/upload/", post(handlers::upload))
        .route("/api/query", post(handlers::query))
        .route("/api/query/", post(handlers::query))
        .route("/api/documents", get(handlers::documents))
        .route("/api/documents/", get(handlers::documents))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(%origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Open the metrics database when enabled. Failure disables metrics rather than
/// stopping the server.
pub fn open_metrics(config: &Config) -> Option<Arc<MetricsStore>> {
    if !config.metrics.enabled {
        return None;
    }
    let path = Config::metrics_db_path()?;
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(error = %e, "failed to create metrics directory");
        return None;
    }

    match MetricsStore::open(&path) {
        Ok(store) => {
            store.cleanup(config.metrics.retention_days);
            info!(
                retention_days = config.metrics.retention_days,
                "metrics enabled"
            );
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!(error = %e, "failed to open metrics database");
            None
        }
    }
}

/// Run the HTTP server until Ctrl-C or SIGTERM.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let pipeline = RagPipeline::from_config(&config)
        .await
        .context("failed to initialise the pipeline")?;

    let state = AppState::new(Arc::new(pipeline))
        .with_metrics(open_metrics(&config))
        .with_upload_dir(config.server.upload_dir.clone())
        .with_max_upload_bytes(config.server.max_upload_bytes)
        .with_cors_origins(config.server.cors_origins.clone());

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(
        addr = %listener.local_addr()?,
        collection = %config.vector_store.collection,
        driver = %config.vector_store.driver,
        "server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
