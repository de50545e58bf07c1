//! Drowsiness Monitor
//!
//! Wires the capture and processing threads together and serves the
//! detector status over HTTP.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod pipeline;
pub mod session;

mod routes;

pub use crate::config::{LogFormat, LoggingConfig, MonitorConfig, RelayConfig, ScenarioConfig, ServerConfig};
pub use pipeline::{processing_loop, Command, Pipeline, PipelineSummary, ProcessingSummary};
pub use session::{DetectionSession, StatusSnapshot};

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Camera error: {0}")]
    Camera(#[from] camera_capture::CameraError),

    #[error("Thread error: {0}")]
    Thread(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers
pub struct AppState {
    /// Latest detector snapshot
    pub status: watch::Receiver<StatusSnapshot>,
    /// Commands to the processing thread
    pub commands: mpsc::UnboundedSender<Command>,
    /// Prometheus render handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        status: watch::Receiver<StatusSnapshot>,
        commands: mpsc::UnboundedSender<Command>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            status,
            commands,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub camera_online: bool,
    pub frames_processed: u64,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/api/v1/reset", post(routes::control::post_reset))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (camera_online, frames_processed) = {
        let snapshot = state.status.borrow();
        (snapshot.camera_online, snapshot.frames_processed)
    };

    Json(HealthResponse {
        status: if camera_online { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        camera_online,
        frames_processed,
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), MonitorError> {
    let level = config.max_level()?;
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    let installed = match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    installed.map_err(|e| MonitorError::Invalid(format!("logging already initialised: {}", e)))
}

/// Run the server until `shutdown` resolves
pub async fn run_server(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), MonitorError> {
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(snapshot: StatusSnapshot) -> (Arc<AppState>, mpsc::UnboundedReceiver<Command>, watch::Sender<StatusSnapshot>) {
        let (status_tx, status) = watch::channel(snapshot);
        let (commands, command_rx) = mpsc::unbounded_channel();
        (Arc::new(AppState::new(status, commands, None)), command_rx, status_tx)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_returns_latest_snapshot() {
        let (state, _rx, status_tx) = state(StatusSnapshot::default());
        status_tx.send_replace(StatusSnapshot {
            blink_count: 3,
            continuous_closed_seconds: 1.25,
            camera_online: true,
            ..Default::default()
        });

        let response = create_router(state)
            .oneshot(Request::builder().uri("/api/v1/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["blink_count"], 3);
        assert_eq!(json["continuous_closed_seconds"], 1.25);
        assert_eq!(json["left_eye"]["state"], "unknown");
        assert_eq!(json["fatigue_level"], "normal");
        assert_eq!(json["processing_fps"], 0.0);
    }

    #[tokio::test]
    async fn test_health_reports_camera_state() {
        let (state, _rx, _tx) = state(StatusSnapshot::default());
        let response = create_router(state)
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["camera_online"], false);
    }

    #[tokio::test]
    async fn test_reset_is_queued() {
        let (state, mut rx, _tx) = state(StatusSnapshot::default());
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(rx.try_recv().unwrap(), Command::Reset);
    }

    #[tokio::test]
    async fn test_reset_after_pipeline_stopped() {
        let (state, rx, _tx) = state(StatusSnapshot::default());
        drop(rx);

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let (state, _rx, _tx) = state(StatusSnapshot::default());
        let response = create_router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
