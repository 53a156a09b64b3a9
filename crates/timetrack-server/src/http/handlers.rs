//! Tracking endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;

use timetrack_core::export::{self, ExportFormat};
use timetrack_core::{EntryFilter, TimeEntry, TrackingEngine, TrackingError, TrackingStatus};

use super::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    pub username: Option<String>,
    pub url: Option<String>,
    pub format: Option<String>,
}

/// Runs an engine call on the blocking pool so storage I/O never stalls the runtime.
async fn run_blocking<T, F>(engine: &TrackingEngine, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&TrackingEngine) -> Result<T, TrackingError> + Send + 'static,
    T: Send + 'static,
{
    let engine = engine.clone();
    let result = tokio::task::spawn_blocking(move || op(&engine)).await?;
    Ok(result?)
}

pub async fn start_handler(
    State(state): State<AppState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TimeEntry>), ApiError> {
    let Json(req) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let entry = run_blocking(&state.engine, move |engine| {
        engine.start(
            req.username.trim(),
            req.url.trim(),
            req.description.trim(),
            Utc::now(),
        )
    })
    .await?;
    tracing::info!(id = entry.id, username = %entry.username, url = %entry.item_url, "tracking started");
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn stop_handler(
    State(state): State<AppState>,
    payload: Result<Json<StopRequest>, JsonRejection>,
) -> Result<Json<TimeEntry>, ApiError> {
    let Json(req) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let entry = run_blocking(&state.engine, move |engine| {
        engine.stop(req.username.trim(), req.url.trim(), Utc::now())
    })
    .await?;
    tracing::info!(
        id = entry.id,
        duration_minutes = entry.duration_minutes.unwrap_or(0),
        "tracking stopped"
    );
    Ok(Json(entry))
}

pub async fn status_handler(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<TrackingStatus>, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let username = query.username.unwrap_or_default();
    let status = run_blocking(&state.engine, move |engine| engine.status(username.trim())).await?;
    Ok(Json(status))
}

pub async fn entries_handler(
    State(state): State<AppState>,
    query: Result<Query<EntriesQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let format = ExportFormat::from_name(query.format.as_deref().unwrap_or_default());
    let filter = EntryFilter::new(query.username.as_deref(), query.url.as_deref());

    let entries = run_blocking(&state.engine, move |engine| engine.list(&filter)).await?;
    let body = export::render(&entries, format)
        .map_err(|err| ApiError::Internal(format!("failed to render entries: {err}")))?;

    let mut response = ([(header::CONTENT_TYPE, format.content_type())], body).into_response();
    if format == ExportFormat::Csv {
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment;filename=entries.csv"),
        );
    }
    Ok(response)
}
