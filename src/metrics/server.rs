//! HTTP endpoints for a running pipeline.
//!
//! - `GET /metrics`: Prometheus text format
//! - `GET /health`: liveness plus the frame count as JSON

use crate::metrics::MetricsRegistry;
use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listener or building the runtime failed.
    #[error("metrics server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("metrics server stopped: {0}")]
    Serve(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 9090).into(),
        }
    }
}

impl MetricsServerConfig {
    /// Creates a config with a custom port.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], port).into(),
        }
    }
}

/// HTTP server exposing the pipeline's metrics.
///
/// The pipeline itself is synchronous, so the server runs on its own
/// thread with a private tokio runtime.
pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: MetricsRegistry,
}

impl MetricsServer {
    /// Creates a new metrics server sharing `registry`.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self { config, registry }
    }

    fn router(registry: MetricsRegistry) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(registry)
    }

    /// Starts the HTTP server on the current tokio runtime.
    ///
    /// This method runs the server until it is shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");
        serve(listener, self.registry).await
    }

    /// Binds the listener, then serves on a background thread.
    ///
    /// Bind errors (port in use, permission denied) are returned here
    /// rather than lost on the server thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<(), ServerError>>, ServerError> {
        let listener = std::net::TcpListener::bind(self.config.bind_addr)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let handle = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()?;
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener)?;
                tracing::info!(%addr, "Metrics server listening");
                serve(listener, self.registry).await
            })
        });
        Ok(handle)
    }
}

async fn serve(
    listener: tokio::net::TcpListener,
    registry: MetricsRegistry,
) -> Result<(), ServerError> {
    axum::serve(listener, MetricsServer::router(registry))
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))
}

async fn metrics_handler(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    match registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "frames": registry.frames(),
    }))
}
