//! Inbound token channels and the deduplicating relay sink
//!
//! The web app publishes the minted token redundantly: a DOM element on the
//! callback page, a `postMessage` envelope, and a custom DOM event, each
//! fired several times. All three paths converge on one `TokenSink`, which
//! dedupes there instead of at each source.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::host::{HostCommand, HostShell};
use crate::messages::{MessageBus, MessageSender, Request, TabId};
use crate::storage::{Credential, CredentialStore};

/// `postMessage` envelope type published by the web app.
pub const AUTH_MESSAGE_TYPE: &str = "NOVATREK_AUTH_TOKEN";
/// Custom DOM event name published by the web app.
pub const AUTH_EVENT_NAME: &str = "novatrek-auth";

/// Transport a token delivery arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    DomElement,
    PostMessage,
    CustomEvent,
}

/// One observed delivery of the credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDelivery {
    pub credential: Credential,
    pub source: TokenSource,
}

impl TokenDelivery {
    pub fn new(credential: Credential, source: TokenSource) -> Self {
        Self { credential, source }
    }
}

fn credential_from(token: Option<&Value>, user_id: Option<&Value>) -> Option<Credential> {
    let token = token?.as_str()?;
    let user_id = user_id?.as_str()?;
    if token.is_empty() || user_id.is_empty() {
        return None;
    }
    Some(Credential::new(token, user_id))
}

/// Parse a `window.postMessage` payload into a delivery.
pub fn parse_post_message(payload: &Value) -> Option<TokenDelivery> {
    if payload.get("type")?.as_str()? != AUTH_MESSAGE_TYPE {
        return None;
    }
    credential_from(payload.get("token"), payload.get("userId"))
        .map(|credential| TokenDelivery::new(credential, TokenSource::PostMessage))
}

/// Parse a custom DOM event into a delivery.
pub fn parse_custom_event(name: &str, detail: &Value) -> Option<TokenDelivery> {
    if name != AUTH_EVENT_NAME {
        return None;
    }
    credential_from(detail.get("token"), detail.get("userId"))
        .map(|credential| TokenDelivery::new(credential, TokenSource::CustomEvent))
}

/// Where every delivery path converges.
///
/// Each accepted delivery is written straight to the store (the background
/// persists the relayed pair as well) and forwarded as `authTokenReceived`;
/// the first one also schedules closing the delivering tab. Repeats of the
/// same pair are dropped; a different pair is processed again, so
/// last-write-wins holds whatever order the paths fire in.
pub struct TokenSink {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn HostShell>,
    tab_id: TabId,
    close_delay: Duration,
    last: Mutex<Option<Credential>>,
}

impl TokenSink {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn CredentialStore>,
        host: Arc<dyn HostShell>,
        tab_id: TabId,
        close_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            store,
            host,
            tab_id,
            close_delay,
            last: Mutex::new(None),
        })
    }

    pub async fn deliver(&self, delivery: TokenDelivery) {
        let first = {
            let mut last = self.last.lock().await;
            if last.as_ref() == Some(&delivery.credential) {
                tracing::trace!("Duplicate token delivery via {:?}", delivery.source);
                return;
            }
            let first = last.is_none();
            *last = Some(delivery.credential.clone());
            first
        };

        tracing::info!(
            "Auth token received via {:?} in tab {}",
            delivery.source,
            self.tab_id
        );

        // Defense in depth: the background writes the relayed pair too, but
        // the message channel can fail independently of the store.
        if let Err(err) = self.store.set(delivery.credential.clone()).await {
            tracing::warn!("Direct credential write failed: {err}");
        }

        let request = Request::AuthTokenReceived {
            token: delivery.credential.auth_token,
            user_id: delivery.credential.user_id,
        };
        if let Err(err) = self
            .bus
            .send(request, MessageSender::from_tab(self.tab_id))
            .await
        {
            tracing::warn!("Token relay to background failed: {err}");
        }

        if first {
            let host = self.host.clone();
            let tab_id = self.tab_id;
            let delay = self.close_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = host.dispatch(HostCommand::CloseTab { tab_id }).await {
                    tracing::debug!("Auth tab {tab_id} already gone: {err}");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCredentialStore;
    use crate::testutil::{wait_for, RecordingHost, ScriptedBus};

    fn delivery(token: &str, user: &str, source: TokenSource) -> TokenDelivery {
        TokenDelivery::new(Credential::new(token, user), source)
    }

    struct Fixture {
        sink: Arc<TokenSink>,
        bus: Arc<ScriptedBus>,
        store: Arc<MemoryCredentialStore>,
        host: Arc<RecordingHost>,
    }

    fn fixture() -> Fixture {
        let bus = ScriptedBus::authenticated(None);
        let store = Arc::new(MemoryCredentialStore::new());
        let host = Arc::new(RecordingHost::new());
        let sink = TokenSink::new(
            bus.clone(),
            store.clone(),
            host.clone(),
            7,
            Duration::from_millis(10),
        );
        Fixture {
            sink,
            bus,
            store,
            host,
        }
    }

    #[tokio::test]
    async fn repeated_deliveries_are_idempotent() {
        let fx = fixture();
        for source in [
            TokenSource::DomElement,
            TokenSource::PostMessage,
            TokenSource::CustomEvent,
        ] {
            fx.sink.deliver(delivery("tok-1", "user-1", source)).await;
        }

        assert_eq!(
            fx.store.get().await.unwrap(),
            Some(Credential::new("tok-1", "user-1"))
        );
        assert_eq!(fx.bus.requests().await.len(), 1);

        let host = fx.host.clone();
        wait_for(|| {
            let host = host.clone();
            async move {
                host.commands()
                    .await
                    .contains(&HostCommand::CloseTab { tab_id: 7 })
            }
        })
        .await;
        assert_eq!(fx.host.commands().await.len(), 1);
    }

    #[tokio::test]
    async fn newer_pair_wins_regardless_of_path() {
        let fx = fixture();
        fx.sink
            .deliver(delivery("tok-a", "user-a", TokenSource::PostMessage))
            .await;
        fx.sink
            .deliver(delivery("tok-b", "user-b", TokenSource::DomElement))
            .await;

        assert_eq!(
            fx.store.get().await.unwrap(),
            Some(Credential::new("tok-b", "user-b"))
        );
        assert_eq!(fx.bus.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn relay_failure_still_persists_the_credential() {
        let bus = ScriptedBus::new(|_| anyhow::bail!("channel closed"));
        let store = Arc::new(MemoryCredentialStore::new());
        let host = Arc::new(RecordingHost::new());
        let sink = TokenSink::new(
            bus,
            store.clone(),
            host,
            7,
            Duration::from_millis(10),
        );

        sink.deliver(delivery("tok-1", "user-1", TokenSource::PostMessage))
            .await;
        assert_eq!(
            store.get().await.unwrap(),
            Some(Credential::new("tok-1", "user-1"))
        );
    }

    #[test]
    fn post_message_parsing_is_strict_about_the_envelope() {
        let valid = serde_json::json!({
            "type": "NOVATREK_AUTH_TOKEN",
            "token": "tok-1",
            "userId": "user-1",
        });
        let parsed = parse_post_message(&valid).unwrap();
        assert_eq!(parsed.source, TokenSource::PostMessage);
        assert_eq!(parsed.credential, Credential::new("tok-1", "user-1"));

        let wrong_type = serde_json::json!({"type": "OTHER", "token": "t", "userId": "u"});
        assert!(parse_post_message(&wrong_type).is_none());

        let empty_token = serde_json::json!({
            "type": "NOVATREK_AUTH_TOKEN",
            "token": "",
            "userId": "user-1",
        });
        assert!(parse_post_message(&empty_token).is_none());

        let missing_user = serde_json::json!({"type": "NOVATREK_AUTH_TOKEN", "token": "t"});
        assert!(parse_post_message(&missing_user).is_none());
    }

    #[test]
    fn custom_event_parsing_checks_the_event_name() {
        let detail = serde_json::json!({"token": "tok-1", "userId": "user-1"});
        let parsed = parse_custom_event("novatrek-auth", &detail).unwrap();
        assert_eq!(parsed.source, TokenSource::CustomEvent);

        assert!(parse_custom_event("other-event", &detail).is_none());
    }
}
