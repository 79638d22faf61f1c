//! REST API server for interview-recorder.
//!
//! Provides HTTP endpoints for:
//! - Session control (start, stop)
//! - Session status

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::recorder::SessionController;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::recording::RecordingState;

pub struct ApiServer {
    port: u16,
    recording_state: RecordingState,
}

impl ApiServer {
    pub fn new(controller: SessionController, config: &Config) -> Self {
        Self {
            port: config.server.port,
            recording_state: RecordingState { controller },
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/version", get(version))
            .merge(routes::recording::router(self.recording_state.clone()))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /              - Service info");
        info!("  POST /start/:mode   - Start a session (audio | video)");
        info!("  POST /stop          - Stop the active session");
        info!("  GET  /status        - Get session status");
        info!("  GET  /version       - Get version info");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "interview-recorder",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "interview-recorder"
    }))
}
