//! Drowsiness Monitor API Server
//!
//! REST surface for the monitoring dashboard: session control, frame
//! ingestion, session status and pending alerts.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod notify;
mod routes;

use alerting::AlertPolicy;
use dms::{build_source, AlertnessState, DmsConfig, DmsError};
use session::{DetectionMonitor, FrameFeed, Session};
use storage::{DetectionStore, HttpDetectionStore, Repository, StorageError};

use crate::config::MonitorConfig;
use crate::notify::NotificationHub;

/// Startup errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Detection setup failed: {0}")]
    Dms(#[from] DmsError),
    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),
}

/// Application state shared across handlers
pub struct AppState {
    pub monitor: DetectionMonitor,
    /// Detection settings; sensitivity updates are applied on top
    pub detection: Mutex<DmsConfig>,
    pub notifications: Arc<NotificationHub>,
    /// Local detection log when no backend is configured
    pub repository: Option<Arc<Repository>>,
    pub metrics: Option<PrometheusHandle>,
    pub source_name: &'static str,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the pipeline from configuration
    pub fn new(config: &MonitorConfig) -> Result<Self, ApiError> {
        let source = build_source(&config.detection)?;
        let source_name = source.name();
        let notifications = Arc::new(NotificationHub::default());
        let policy = AlertPolicy::new(
            config.alerts.clone(),
            notifications.clone(),
            notifications.clone(),
        );
        let session = Session::new(config.detection.thresholds(), config.detection.smoothing_ticks);

        let mut monitor = DetectionMonitor::new(
            session,
            source,
            policy,
            FrameFeed::new(),
            config.session.clone(),
        );

        let mut repository = None;
        match (&config.persistence.auth_token, &config.persistence.base_url) {
            (Some(token), Some(base_url)) => {
                let store = HttpDetectionStore::new(base_url, token.clone())?;
                info!("Persisting detections to {}", store.url());
                monitor = monitor.with_store(Arc::new(store));
            }
            (Some(_), None) => {
                let repo = Arc::new(Repository::new());
                monitor = monitor.with_store(repo.clone() as Arc<dyn DetectionStore>);
                repository = Some(repo);
            }
            (None, _) => info!("No auth token configured: detections are not persisted"),
        }

        Ok(Self {
            monitor,
            detection: Mutex::new(config.detection.clone()),
            notifications,
            repository,
            metrics: None,
            source_name,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub source: String,
    pub frame_ready: bool,
    pub session_status: AlertnessState,
    pub stored_detections: Option<usize>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/session", get(routes::session::get_session))
        .route("/api/v1/session/start", post(routes::session::start_session))
        .route("/api/v1/session/stop", post(routes::session::stop_session))
        .route("/api/v1/settings", put(routes::session::update_settings))
        .route("/api/v1/frames", post(routes::frames::publish_frame))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        source: state.source_name.to_string(),
        frame_ready: state.monitor.input_ready(),
        session_status: state.monitor.snapshot().status,
        stored_detections: state.repository.as_ref().map(|r| r.count()),
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// Install the Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    }
}

/// Run the server
pub async fn run_server(config: MonitorConfig) -> anyhow::Result<()> {
    let mut state = AppState::new(&config)?;
    if let Some(handle) = init_metrics() {
        state = state.with_metrics(handle);
    }
    let state = Arc::new(state);
    let app = create_router(state.clone());

    info!("Starting API server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if state.monitor.is_running() {
        let stats = state.monitor.stop()?;
        info!("Session closed on shutdown after {}", stats.duration_hms());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
