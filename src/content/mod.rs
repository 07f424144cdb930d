//! Content-script agent logic: token extraction and the quick-save affordance
//!
//! One `PageSession` exists per tracked tab. The in-page listeners
//! (postMessage, custom event) are active on every page; the DOM poll for
//! the token element only runs on the auth-callback route.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::RegexSet;
use tokio::sync::RwLock;
use url::Url;

use crate::host::{HostCommand, HostEvent, HostShell};
use crate::messages::{CaptureRequest, MessageBus, MessageSender, Request, TabId};
use crate::relay::{self, TokenDelivery, TokenSink, TokenSource};
use crate::settings::ClipperSettings;
use crate::storage::{Credential, CredentialStore};

/// Vocabulary for the quick-save heuristic.
const TRAVEL_VOCABULARY: &[&str] = &[
    "hotel",
    "hostel",
    "flight",
    "airline",
    "airport",
    "itinerary",
    "booking",
    "travel",
    "trip",
    "vacation",
    "destination",
    "museum",
    "beach",
    "tour",
    "resort",
    "restaurant",
];

static TRAVEL_MATCHER: Lazy<RegexSet> = Lazy::new(|| {
    let patterns: Vec<String> = TRAVEL_VOCABULARY
        .iter()
        .map(|word| format!(r"(?i)\b{word}\b"))
        .collect();
    RegexSet::new(patterns).expect("travel vocabulary patterns are valid")
});

/// One-shot check whether page text reads like travel content.
pub fn looks_like_travel_content(text: &str) -> bool {
    TRAVEL_MATCHER.is_match(text)
}

/// Latest DOM snapshot of a page, fed by the shim.
#[derive(Default)]
pub struct PageView {
    auth_element: RwLock<Option<Credential>>,
}

impl PageView {
    pub async fn set_auth_element(&self, credential: Credential) {
        *self.auth_element.write().await = Some(credential);
    }

    pub async fn auth_element(&self) -> Option<Credential> {
        self.auth_element.read().await.clone()
    }
}

/// Per-tab content-script state.
pub struct PageSession {
    view: Arc<PageView>,
    sink: Arc<TokenSink>,
}

/// Drives the content-script logic for all tracked tabs.
pub struct ContentAgent {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn HostShell>,
    settings: ClipperSettings,
    sessions: RwLock<HashMap<TabId, Arc<PageSession>>>,
}

impl ContentAgent {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn CredentialStore>,
        host: Arc<dyn HostShell>,
        settings: ClipperSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            store,
            host,
            settings,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// React to a page-level event from the shim.
    pub async fn handle_host_event(&self, event: &HostEvent) {
        match event {
            HostEvent::PageLoaded { tab_id, url, text } => {
                self.page_loaded(*tab_id, url, text).await;
            }
            HostEvent::AuthElement {
                tab_id,
                token,
                user_id,
            } => {
                let session = self.ensure_session(*tab_id).await;
                session
                    .view
                    .set_auth_element(Credential::new(token.clone(), user_id.clone()))
                    .await;
            }
            HostEvent::PageMessage { tab_id, payload } => {
                if let Some(delivery) = relay::parse_post_message(payload) {
                    self.deliver(*tab_id, delivery).await;
                }
            }
            HostEvent::PageEvent {
                tab_id,
                name,
                detail,
            } => {
                if let Some(delivery) = relay::parse_custom_event(name, detail) {
                    self.deliver(*tab_id, delivery).await;
                }
            }
            HostEvent::QuickSaveClicked { tab_id, url, title } => {
                self.quick_save_clicked(*tab_id, url, title).await;
            }
            HostEvent::TabClosed { tab_id } => {
                self.sessions.write().await.remove(tab_id);
            }
            _ => {}
        }
    }

    async fn page_loaded(&self, tab_id: TabId, url: &str, text: &str) {
        let session = self.ensure_session(tab_id).await;

        if let Ok(parsed) = Url::parse(url) {
            if self.settings.is_auth_callback(&parsed) {
                tracing::debug!("Auth callback page in tab {tab_id}, polling for token element");
                tokio::spawn(poll_auth_element(
                    session.view.clone(),
                    session.sink.clone(),
                    self.settings.dom_poll_interval(),
                    self.settings.dom_poll_window(),
                ));
            }
        }

        if looks_like_travel_content(text) {
            let command = HostCommand::ShowQuickSaveButton { tab_id };
            if let Err(err) = self.host.dispatch(command).await {
                tracing::warn!("Quick-save button injection failed: {err}");
            }
        }
    }

    async fn quick_save_clicked(&self, tab_id: TabId, url: &str, title: &str) {
        let request = Request::Save {
            data: CaptureRequest::quick(url, title),
        };
        if let Err(err) = self.bus.send(request, MessageSender::from_tab(tab_id)).await {
            tracing::warn!("Quick save from tab {tab_id} failed to send: {err}");
        }
    }

    async fn deliver(&self, tab_id: TabId, delivery: TokenDelivery) {
        let session = self.ensure_session(tab_id).await;
        session.sink.deliver(delivery).await;
    }

    /// The in-page listeners fire on pages we may not have tracked yet.
    async fn ensure_session(&self, tab_id: TabId) -> Arc<PageSession> {
        if let Some(session) = self.sessions.read().await.get(&tab_id) {
            return session.clone();
        }
        let session = Arc::new(PageSession {
            view: Arc::new(PageView::default()),
            sink: TokenSink::new(
                self.bus.clone(),
                self.store.clone(),
                self.host.clone(),
                tab_id,
                self.settings.tab_close_delay(),
            ),
        });
        self.sessions
            .write()
            .await
            .insert(tab_id, session.clone());
        session
    }
}

/// Bounded retry for the token element.
///
/// Absence of the element before the window closes is the normal "user not
/// signed in yet" case, so the loop ends silently.
async fn poll_auth_element(
    view: Arc<PageView>,
    sink: Arc<TokenSink>,
    interval: Duration,
    window: Duration,
) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        if let Some(credential) = view.auth_element().await {
            sink.deliver(TokenDelivery::new(credential, TokenSource::DomElement))
                .await;
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::debug!("No token element before timeout; giving up");
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCredentialStore;
    use crate::testutil::{RecordingHost, ScriptedBus};

    const CALLBACK_URL: &str = "https://novatrek.app/auth/extension";

    struct Fixture {
        agent: Arc<ContentAgent>,
        bus: Arc<ScriptedBus>,
        store: Arc<MemoryCredentialStore>,
        host: Arc<RecordingHost>,
    }

    fn fixture() -> Fixture {
        let bus = ScriptedBus::authenticated(None);
        let store = Arc::new(MemoryCredentialStore::new());
        let host = Arc::new(RecordingHost::new());
        let agent = ContentAgent::new(
            bus.clone(),
            store.clone(),
            host.clone(),
            ClipperSettings::default(),
        );
        Fixture {
            agent,
            bus,
            store,
            host,
        }
    }

    fn page_loaded(tab_id: TabId, url: &str, text: &str) -> HostEvent {
        HostEvent::PageLoaded {
            tab_id,
            url: url.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn travel_vocabulary_matches_whole_words_case_insensitively() {
        assert!(looks_like_travel_content("Best HOTEL deals in Paris"));
        assert!(looks_like_travel_content("plan your itinerary today"));
        assert!(!looks_like_travel_content("rust compiler internals"));
        assert!(!looks_like_travel_content("shotels are not a word"));
    }

    #[tokio::test]
    async fn travel_pages_get_the_quick_save_button() {
        let fx = fixture();
        fx.agent
            .handle_host_event(&page_loaded(1, "https://example.com", "cheap flight to Rome"))
            .await;
        fx.agent
            .handle_host_event(&page_loaded(2, "https://example.com", "linker errors explained"))
            .await;

        let commands = fx.host.commands().await;
        assert!(commands.contains(&HostCommand::ShowQuickSaveButton { tab_id: 1 }));
        assert!(!commands.contains(&HostCommand::ShowQuickSaveButton { tab_id: 2 }));
    }

    #[tokio::test]
    async fn quick_save_click_sends_a_page_capture() {
        let fx = fixture();
        fx.agent
            .handle_host_event(&HostEvent::QuickSaveClicked {
                tab_id: 3,
                url: "https://example.com/paris".to_string(),
                title: "Paris guide".to_string(),
            })
            .await;

        let requests = fx.bus.requests().await;
        assert_eq!(requests.len(), 1);
        let (Request::Save { data }, sender) = requests[0].clone() else {
            panic!("expected save request");
        };
        assert_eq!(data.url, "https://example.com/paris");
        assert_eq!(data.kind, crate::messages::CaptureKind::Page);
        assert_eq!(sender.tab_id, Some(3));
    }

    #[tokio::test]
    async fn post_message_delivery_reaches_the_store() {
        let fx = fixture();
        fx.agent
            .handle_host_event(&HostEvent::PageMessage {
                tab_id: 4,
                payload: serde_json::json!({
                    "type": "NOVATREK_AUTH_TOKEN",
                    "token": "tok-1",
                    "userId": "user-1",
                }),
            })
            .await;

        assert_eq!(
            fx.store.get().await.unwrap(),
            Some(Credential::new("tok-1", "user-1"))
        );
        assert_eq!(fx.bus.requests().await.len(), 1);

        // Unrelated messages are ignored
        fx.agent
            .handle_host_event(&HostEvent::PageMessage {
                tab_id: 4,
                payload: serde_json::json!({"type": "ANALYTICS", "token": "x"}),
            })
            .await;
        assert_eq!(fx.bus.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn custom_event_delivery_reaches_the_store() {
        let fx = fixture();
        fx.agent
            .handle_host_event(&HostEvent::PageEvent {
                tab_id: 4,
                name: "novatrek-auth".to_string(),
                detail: serde_json::json!({"token": "tok-2", "userId": "user-2"}),
            })
            .await;

        assert_eq!(
            fx.store.get().await.unwrap(),
            Some(Credential::new("tok-2", "user-2"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dom_poll_picks_up_a_late_token_element() {
        let fx = fixture();
        fx.agent
            .handle_host_event(&page_loaded(5, CALLBACK_URL, ""))
            .await;

        // Element appears half a second in, well inside the poll window
        tokio::time::sleep(Duration::from_millis(500)).await;
        fx.agent
            .handle_host_event(&HostEvent::AuthElement {
                tab_id: 5,
                token: "tok-dom".to_string(),
                user_id: "user-dom".to_string(),
            })
            .await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(
            fx.store.get().await.unwrap(),
            Some(Credential::new("tok-dom", "user-dom"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dom_poll_gives_up_silently_after_the_window() {
        let fx = fixture();
        fx.agent
            .handle_host_event(&page_loaded(6, CALLBACK_URL, ""))
            .await;

        // Past the window: the poll has ended, a late element changes nothing
        tokio::time::sleep(Duration::from_millis(11_000)).await;
        fx.agent
            .handle_host_event(&HostEvent::AuthElement {
                tab_id: 6,
                token: "tok-late".to_string(),
                user_id: "user-late".to_string(),
            })
            .await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        assert_eq!(fx.store.get().await.unwrap(), None);
        assert!(fx.bus.requests().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_poll_runs_on_ordinary_pages() {
        let fx = fixture();
        fx.agent
            .handle_host_event(&page_loaded(7, "https://example.com", ""))
            .await;
        fx.agent
            .handle_host_event(&HostEvent::AuthElement {
                tab_id: 7,
                token: "tok-x".to_string(),
                user_id: "user-x".to_string(),
            })
            .await;
        tokio::time::sleep(Duration::from_millis(2_000)).await;

        assert_eq!(fx.store.get().await.unwrap(), None);
    }
}
