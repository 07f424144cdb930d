//! HTTP client for the NovaTrek capture and trip endpoints

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{CaptureKind, CaptureRequest};
use crate::storage::Credential;

const CAPTURE_PATH: &str = "/api/captures-simple";
const TRIPS_PATH: &str = "/api/trips/list";
const CAPTURE_SOURCE: &str = "browser-extension";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl ApiError {
    /// Whether the server response means the stored session is no longer
    /// valid and the credential must be dropped.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            ApiError::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED
                    || *status == StatusCode::INTERNAL_SERVER_ERROR
        )
    }
}

/// Outbound capture payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureBody {
    pub content: String,
    pub content_type: String,
    pub source: String,
    pub source_url: String,
    pub title: String,
    pub captured_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
}

impl CaptureBody {
    /// Build the outbound body from a capture request.
    ///
    /// `content` is the captured thing itself (selection, link or image URL
    /// per kind), falling back to the page URL when it is missing. `notes`
    /// is only sent alongside a text selection; an explicit note wins over
    /// the selection itself.
    pub fn from_request(request: &CaptureRequest) -> Self {
        let selected = request
            .selected_text
            .as_deref()
            .filter(|text| !text.is_empty());
        let primary = match request.kind {
            CaptureKind::Page => Some(request.url.as_str()),
            CaptureKind::Text => selected,
            CaptureKind::Link => request.link_url.as_deref(),
            CaptureKind::Image => request.image_url.as_deref(),
        };
        let content = [
            primary,
            Some(request.url.as_str()),
            selected,
            request.link_url.as_deref(),
            request.image_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string();

        let notes = selected.map(|text| {
            request
                .notes
                .clone()
                .filter(|note| !note.is_empty())
                .unwrap_or_else(|| text.to_string())
        });

        Self {
            content,
            content_type: request.kind.content_type().to_string(),
            source: CAPTURE_SOURCE.to_string(),
            source_url: request.url.clone(),
            title: request.title.clone(),
            captured_at: chrono::Utc::now().to_rfc3339(),
            notes,
            tags: request.tags.clone(),
            trip_id: request.trip_id.clone(),
        }
    }
}

/// Trip summary as listed by the trips endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TripListResponse {
    trips: Vec<TripSummary>,
}

/// Client for the NovaTrek web API.
pub struct NovaTrekClient {
    client: reqwest::Client,
    base_url: String,
}

impl NovaTrekClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self { client, base_url }
    }

    /// Submit a capture on behalf of the credential's user.
    pub async fn submit_capture(
        &self,
        credential: &Credential,
        body: &CaptureBody,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, CAPTURE_PATH))
            .header("Content-Type", "application/json")
            .header(
                "Authorization",
                format!("Bearer {}", credential.auth_token),
            )
            .header("X-User-Id", &credential.user_id)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }

    /// Fetch the user's trips for the assignment dropdown.
    pub async fn list_trips(
        &self,
        credential: &Credential,
    ) -> Result<Vec<TripSummary>, ApiError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, TRIPS_PATH))
            .header(
                "Authorization",
                format!("Bearer {}", credential.auth_token),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let listing: TripListResponse = response.json().await?;
        Ok(listing.trips)
    }
}
