//! Typed message contract between the extension contexts
//!
//! The browser shim speaks a small `action`-tagged RPC dialect; modelling it
//! as a closed enum keeps the router exhaustive instead of branching on
//! strings at runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Host-browser tab identifier.
pub type TabId = u32;

/// What a capture request is capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Page,
    Text,
    Link,
    Image,
}

impl CaptureKind {
    /// Wire value sent to the capture API.
    ///
    /// Whole-page captures are ingested as links; everything else keeps its
    /// own kind.
    pub fn content_type(self) -> &'static str {
        match self {
            CaptureKind::Page | CaptureKind::Link => "link",
            CaptureKind::Text => "text",
            CaptureKind::Image => "image",
        }
    }
}

/// A single capture, built by a context-menu click or the popup form.
///
/// Never persisted; consumed once by the background save routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub url: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: CaptureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
}

impl CaptureRequest {
    /// Minimal whole-page capture (quick-save path).
    pub fn quick(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            kind: CaptureKind::Page,
            selected_text: None,
            link_url: None,
            image_url: None,
            notes: None,
            tags: None,
            trip_id: None,
        }
    }
}

/// Requests accepted by the background coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    Save { data: CaptureRequest },
    GetAuthStatus,
    AuthTokenReceived { token: String, user_id: String },
}

/// Authenticated user reference returned by `getAuthStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
}

/// Responses emitted by the background coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Response {
    AuthStatus {
        is_authenticated: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<AuthUser>,
    },
    Ack {
        success: bool,
    },
}

impl Response {
    pub fn ack() -> Self {
        Response::Ack { success: true }
    }
}

/// Where a request came from, as reported by the host runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageSender {
    pub tab_id: Option<TabId>,
}

impl MessageSender {
    pub fn from_tab(tab_id: TabId) -> Self {
        Self {
            tab_id: Some(tab_id),
        }
    }
}

/// Request/response messaging between contexts.
///
/// The background coordinator is the only implementor in production; tests
/// substitute recording fakes.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn send(&self, request: Request, sender: MessageSender) -> anyhow::Result<Response>;
}
