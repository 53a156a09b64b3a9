//! Mapping from tracking failures to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use timetrack_core::{ErrorKind, TrackingError};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    /// The request could not be decoded.
    #[error("{0}")]
    BadRequest(String),
    /// The server failed to run the operation.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Tracking(err) => status_for(err.kind()),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Tracking(err) => err.kind().as_str(),
            Self::BadRequest(_) => ErrorKind::InvalidInput.as_str(),
            Self::Internal(_) => "internal",
        }
    }
}

/// Outward status for each error kind. Every kind maps to a distinct status.
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyActive => StatusCode::CONFLICT,
        ErrorKind::NoActiveEntry => StatusCode::NOT_FOUND,
        ErrorKind::NotFound => StatusCode::GONE,
        ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("tracking task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
