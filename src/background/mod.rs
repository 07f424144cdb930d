//! Background coordinator: message router, capture pipeline, badge

pub mod badge;
pub mod menus;

pub use badge::{BadgeController, BadgeState};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::api::{CaptureBody, NovaTrekClient};
use crate::host::{HostCommand, HostEvent, HostShell};
use crate::messages::{
    AuthUser, CaptureRequest, MessageBus, MessageSender, Request, Response,
};
use crate::settings::ClipperSettings;
use crate::storage::{Credential, CredentialStore};

/// The long-running coordination context.
///
/// Owns the capture pipeline, the badge, menu registration and the message
/// router; it is the only component allowed to invalidate credentials on
/// capture failures.
pub struct Coordinator {
    store: Arc<dyn CredentialStore>,
    api: Arc<NovaTrekClient>,
    host: Arc<dyn HostShell>,
    badge: BadgeController,
    settings: ClipperSettings,
    capture_tx: mpsc::UnboundedSender<CaptureRequest>,
}

impl Coordinator {
    /// Build the coordinator and start its capture worker.
    ///
    /// Captures are serialized through the worker queue: rapid saves run one
    /// after another instead of racing each other's badge timers.
    pub fn spawn(
        store: Arc<dyn CredentialStore>,
        api: Arc<NovaTrekClient>,
        host: Arc<dyn HostShell>,
        settings: ClipperSettings,
    ) -> Arc<Self> {
        let badge = BadgeController::new(host.clone(), settings.badge_reset());
        let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();

        let coordinator = Arc::new(Self {
            store,
            api,
            host,
            badge,
            settings,
            capture_tx,
        });

        let worker = coordinator.clone();
        tokio::spawn(async move {
            while let Some(data) = capture_rx.recv().await {
                worker.run_capture(data).await;
            }
        });

        coordinator
    }

    pub fn badge(&self) -> &BadgeController {
        &self.badge
    }

    /// Handle one request from another context.
    pub async fn handle_request(&self, request: Request, sender: MessageSender) -> Response {
        match request {
            Request::Save { data } => {
                self.enqueue_capture(data);
                Response::ack()
            }
            Request::GetAuthStatus => self.auth_status().await,
            Request::AuthTokenReceived { token, user_id } => {
                if let Err(err) = self.store.set(Credential::new(token, user_id)).await {
                    tracing::error!("Failed to persist relayed credential: {err}");
                }
                if let Some(tab_id) = sender.tab_id {
                    // The auth tab may have closed itself already
                    if let Err(err) = self.host.dispatch(HostCommand::CloseTab { tab_id }).await {
                        tracing::debug!("Could not close auth tab {tab_id}: {err}");
                    }
                }
                Response::ack()
            }
        }
    }

    /// Queue a capture; the acknowledgment to the caller is immediate.
    pub fn enqueue_capture(&self, data: CaptureRequest) {
        if self.capture_tx.send(data).is_err() {
            tracing::error!("Capture worker is gone; dropping capture");
        }
    }

    /// React to a host-browser lifecycle event.
    pub async fn handle_host_event(&self, event: &HostEvent) {
        match event {
            HostEvent::Installed => self.register_menus().await,
            HostEvent::TabCompleted { tab_id, url } => self.watch_tab(*tab_id, url).await,
            HostEvent::MenuClicked { .. } => {
                if let Some(request) = menus::capture_for_menu_click(event) {
                    self.enqueue_capture(request);
                }
            }
            _ => {}
        }
    }

    async fn register_menus(&self) {
        let command = HostCommand::RegisterContextMenus {
            items: menus::context_menu_items(),
        };
        // Re-registration on updates hits duplicate menu IDs; the shim
        // ignores those, and a dead bridge is not worth failing install for.
        if let Err(err) = self.host.dispatch(command).await {
            tracing::warn!("Context menu registration failed: {err}");
        }
    }

    /// Inject the content script into tabs that land on the auth callback.
    async fn watch_tab(&self, tab_id: crate::messages::TabId, url: &str) {
        let Ok(parsed) = Url::parse(url) else {
            return;
        };
        if !self.settings.is_auth_callback(&parsed) {
            return;
        }
        tracing::info!("Auth callback opened in tab {tab_id}, injecting content script");
        if let Err(err) = self
            .host
            .dispatch(HostCommand::InjectContentScript { tab_id })
            .await
        {
            // Non-fatal: the user can still finish auth by hand
            tracing::warn!("Content script injection into tab {tab_id} failed: {err}");
        }
    }

    async fn auth_status(&self) -> Response {
        let credential = match self.store.get().await {
            Ok(credential) => credential,
            Err(err) => {
                tracing::warn!("Credential read failed: {err}");
                None
            }
        };
        match credential.filter(|c| !c.auth_token.is_empty()) {
            Some(credential) => Response::AuthStatus {
                is_authenticated: true,
                user: Some(AuthUser {
                    uid: credential.user_id,
                }),
            },
            None => Response::AuthStatus {
                is_authenticated: false,
                user: None,
            },
        }
    }

    /// The capture pipeline; runs on the serialized worker.
    async fn run_capture(&self, data: CaptureRequest) {
        let credential = match self.store.get().await {
            Ok(Some(credential)) if !credential.auth_token.is_empty() => credential,
            Ok(_) => {
                tracing::info!("Capture without credential; prompting login");
                self.open_popup().await;
                return;
            }
            Err(err) => {
                tracing::warn!("Credential read failed: {err}");
                self.open_popup().await;
                return;
            }
        };

        self.badge.set(BadgeState::Pending).await;
        let body = CaptureBody::from_request(&data);

        match self.api.submit_capture(&credential, &body).await {
            Ok(()) => {
                tracing::info!("Captured {}", body.source_url);
                self.badge.set_transient(BadgeState::Success).await;
                if self.settings.show_notifications {
                    let notify = HostCommand::Notify {
                        title: "Saved to NovaTrek".to_string(),
                        body: data.title.clone(),
                    };
                    if let Err(err) = self.host.dispatch(notify).await {
                        tracing::warn!("Notification failed: {err}");
                    }
                }
            }
            Err(err) => {
                tracing::warn!("Capture failed: {err}");
                self.badge.set_transient(BadgeState::Error).await;
                if err.invalidates_session() {
                    tracing::info!("Session rejected by server; clearing credential");
                    if let Err(err) = self.store.clear().await {
                        tracing::error!("Failed to clear credential: {err}");
                    }
                }
            }
        }
    }

    async fn open_popup(&self) {
        if let Err(err) = self.host.dispatch(HostCommand::OpenPopup).await {
            tracing::warn!("Could not open popup: {err}");
        }
    }
}

#[async_trait]
impl MessageBus for Coordinator {
    async fn send(&self, request: Request, sender: MessageSender) -> anyhow::Result<Response> {
        Ok(self.handle_request(request, sender).await)
    }
}
