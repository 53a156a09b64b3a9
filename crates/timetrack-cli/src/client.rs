//! HTTP client for the tracker server.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use timetrack_core::{EntryFilter, ExportFormat, TimeEntry, TrackingStatus};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server rejected the request.
    #[error("{operation} request failed ({status}): {message}")]
    Api {
        operation: &'static str,
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Machine-readable error code reported by the server, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct StartPayload<'a> {
    username: &'a str,
    url: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct StopPayload<'a> {
    username: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
    code: Option<String>,
}

/// Tracker API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(ClientError::ClientBuild)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Starts tracking the item for the user.
    pub async fn start(
        &self,
        username: &str,
        url: &str,
        description: &str,
    ) -> Result<TimeEntry, ClientError> {
        let response = self
            .http
            .post(self.endpoint("/api/start"))
            .json(&StartPayload {
                username,
                url,
                description,
            })
            .send()
            .await?;
        let body = checked_body("start", response).await?;
        parse_json(&body)
    }

    /// Stops tracking the item for the user.
    pub async fn stop(&self, username: &str, url: &str) -> Result<TimeEntry, ClientError> {
        let response = self
            .http
            .post(self.endpoint("/api/stop"))
            .json(&StopPayload { username, url })
            .send()
            .await?;
        let body = checked_body("stop", response).await?;
        parse_json(&body)
    }

    /// Fetches whether the user has an open entry.
    pub async fn status(&self, username: &str) -> Result<TrackingStatus, ClientError> {
        let response = self
            .http
            .get(self.endpoint("/api/status"))
            .query(&[("username", username)])
            .send()
            .await?;
        let body = checked_body("status", response).await?;
        parse_json(&body)
    }

    /// Fetches entries as the raw export body in the requested format.
    pub async fn entries(
        &self,
        filter: &EntryFilter,
        format: ExportFormat,
    ) -> Result<String, ClientError> {
        let mut query = vec![("format", format.as_str())];
        if let Some(username) = filter.username() {
            query.push(("username", username));
        }
        if let Some(url) = filter.item_url() {
            query.push(("url", url));
        }

        let response = self
            .http
            .get(self.endpoint("/api/entries"))
            .query(&query)
            .send()
            .await?;
        checked_body("entries", response).await
    }
}

async fn checked_body(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<String, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }

    tracing::debug!(operation, status = status.as_u16(), %body, "server rejected request");
    let (code, message) = match serde_json::from_str::<ErrorPayload>(&body) {
        Ok(payload) => (payload.code, payload.error),
        Err(_) => (None, body.trim().to_string()),
    };
    Err(ClientError::Api {
        operation,
        status: status.as_u16(),
        code,
        message,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|err| ClientError::InvalidResponse(err.to_string()))
}
