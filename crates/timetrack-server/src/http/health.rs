//! Liveness, health and landing page.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Body of `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub time: String,
}

pub async fn live_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.clone();
    let reachable = match tokio::task::spawn_blocking(move || engine.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "health check: database unreachable");
            false
        }
        Err(err) => {
            tracing::warn!(error = %err, "health check task failed");
            false
        }
    };

    let (code, status, database) = if reachable {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "error", "unreachable")
    };
    let body = HealthStatus {
        status: status.to_string(),
        database: database.to_string(),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    (code, Json(body))
}

pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
