//! HTTP API server for the team time tracker.
//!
//! Exposes the tracking engine over JSON endpoints:
//! - `POST /api/start`, `POST /api/stop`
//! - `GET /api/status?username=`
//! - `GET /api/entries?username=&url=&format=json|csv`
//! - `GET /live`, `GET /health`, `GET /`

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post};

use timetrack_core::TrackingEngine;

mod config;
pub mod http;

pub use config::{Config, DatabaseConfig, dirs_data_path};
pub use http::error::{ApiError, ErrorBody};
pub use http::health::HealthStatus;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: TrackingEngine,
}

impl AppState {
    pub const fn new(engine: TrackingEngine) -> Self {
        Self { engine }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::health::index_handler))
        .route("/live", get(http::health::live_handler))
        .route("/health", get(http::health::health_handler))
        .route("/api/start", post(http::handlers::start_handler))
        .route("/api/stop", post(http::handlers::stop_handler))
        .route("/api/status", get(http::handlers::status_handler))
        .route("/api/entries", get(http::handlers::entries_handler))
        .layer(from_fn(http::request_tracing_middleware))
        .layer(from_fn(http::cors_middleware))
        .with_state(state)
}
