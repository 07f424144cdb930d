//! Popup view controller: a reactive projection of auth + trip state
//!
//! The popup owns no authoritative state. It re-derives everything from
//! `getAuthStatus` on open, on visibility gain, and on credential-store
//! changes, and pushes a render model to the shim after every transition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::api::{NovaTrekClient, TripSummary};
use crate::host::{HostCommand, HostEvent, HostShell, PopupForm, TabMetadata};
use crate::messages::{CaptureKind, CaptureRequest, MessageBus, MessageSender, Request, Response};
use crate::storage::CredentialStore;

/// Which of the three mutually exclusive views is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupView {
    Login,
    Main,
    Success,
}

/// One entry in the trip-assignment dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    pub label: String,
    pub enabled: bool,
}

/// Everything the popup renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupViewModel {
    pub view: PopupView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tab: Option<TabMetadata>,
    pub trip_options: Vec<TripOption>,
    pub submitting: bool,
}

struct PopupState {
    view: PopupView,
    current_tab: Option<TabMetadata>,
    trips: Vec<TripSummary>,
    submitting: bool,
    visible: bool,
}

impl PopupState {
    fn new() -> Self {
        Self {
            view: PopupView::Login,
            current_tab: None,
            trips: Vec::new(),
            submitting: false,
            visible: false,
        }
    }
}

pub struct PopupController {
    bus: Arc<dyn MessageBus>,
    api: Arc<NovaTrekClient>,
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn HostShell>,
    state: Mutex<PopupState>,
}

impl PopupController {
    /// Build the controller and subscribe it to credential changes.
    pub fn spawn(
        bus: Arc<dyn MessageBus>,
        api: Arc<NovaTrekClient>,
        store: Arc<dyn CredentialStore>,
        host: Arc<dyn HostShell>,
    ) -> Arc<Self> {
        let controller = Arc::new(Self {
            bus,
            api,
            store: store.clone(),
            host,
            state: Mutex::new(PopupState::new()),
        });

        let watcher = controller.clone();
        let mut changes = store.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let visible = watcher.state.lock().await.visible;
                if visible {
                    watcher.refresh().await;
                }
            }
        });

        controller
    }

    pub async fn handle_host_event(&self, event: &HostEvent) {
        match event {
            HostEvent::PopupOpened { tab } => self.opened(tab.clone()).await,
            HostEvent::PopupVisibility { visible } => {
                self.state.lock().await.visible = *visible;
                if *visible {
                    self.refresh().await;
                }
            }
            HostEvent::PopupSubmit { form } => self.submit(form.clone()).await,
            HostEvent::PopupQuickSave => self.quick_save().await,
            HostEvent::PopupLogout => self.logout().await,
            _ => {}
        }
    }

    pub async fn view_model(&self) -> PopupViewModel {
        let state = self.state.lock().await;
        Self::render(&state)
    }

    async fn opened(&self, tab: Option<TabMetadata>) {
        {
            let mut state = self.state.lock().await;
            state.visible = true;
            state.current_tab = tab;
            state.submitting = false;
        }
        self.refresh().await;
    }

    /// Re-derive the view from auth status.
    pub async fn refresh(&self) {
        let authenticated = match self
            .bus
            .send(Request::GetAuthStatus, MessageSender::default())
            .await
        {
            Ok(Response::AuthStatus {
                is_authenticated, ..
            }) => is_authenticated,
            Ok(_) => false,
            Err(err) => {
                tracing::warn!("Auth status query failed: {err}");
                false
            }
        };

        if !authenticated {
            self.show_login().await;
            return;
        }
        self.enter_main().await;
    }

    async fn enter_main(&self) {
        let credential = match self.store.get().await {
            Ok(Some(credential)) => credential,
            _ => {
                self.show_login().await;
                return;
            }
        };

        match self.api.list_trips(&credential).await {
            Ok(trips) => {
                let mut state = self.state.lock().await;
                state.view = PopupView::Main;
                state.trips = trips;
                state.submitting = false;
                let model = Self::render(&state);
                drop(state);
                self.publish(model).await;
            }
            Err(err) => {
                // The trip list is bearer-authenticated; treat any failure
                // like the background treats a rejected capture session
                tracing::warn!("Trip list fetch failed: {err}");
                if let Err(err) = self.store.clear().await {
                    tracing::error!("Failed to clear credential: {err}");
                }
                self.show_login().await;
            }
        }
    }

    async fn show_login(&self) {
        let mut state = self.state.lock().await;
        state.view = PopupView::Login;
        state.trips.clear();
        state.submitting = false;
        let model = Self::render(&state);
        drop(state);
        self.publish(model).await;
    }

    /// Full save from the form: spinner on, ack moves to the success view,
    /// a dead channel re-enables the form with nothing kept.
    async fn submit(&self, form: PopupForm) {
        let data = {
            let mut state = self.state.lock().await;
            let Some(tab) = state.current_tab.clone() else {
                tracing::debug!("Submit without a current tab; ignoring");
                return;
            };
            state.submitting = true;
            let model = Self::render(&state);
            drop(state);
            self.publish(model).await;

            CaptureRequest {
                url: tab.url,
                title: tab.title,
                kind: CaptureKind::Page,
                selected_text: None,
                link_url: None,
                image_url: None,
                notes: form.notes,
                tags: form.tags,
                trip_id: form.trip_id,
            }
        };

        match self
            .bus
            .send(Request::Save { data }, MessageSender::default())
            .await
        {
            Ok(_) => {
                let mut state = self.state.lock().await;
                state.view = PopupView::Success;
                state.submitting = false;
                let model = Self::render(&state);
                drop(state);
                self.publish(model).await;
            }
            Err(err) => {
                tracing::warn!("Save message failed: {err}");
                let mut state = self.state.lock().await;
                state.submitting = false;
                let model = Self::render(&state);
                drop(state);
                self.publish(model).await;
            }
        }
    }

    /// Quick save: fire the minimal capture and close without waiting for
    /// the pipeline's outcome; the badge is the only feedback left.
    async fn quick_save(&self) {
        let tab = self.state.lock().await.current_tab.clone();
        if let Some(tab) = tab {
            let request = Request::Save {
                data: CaptureRequest::quick(tab.url, tab.title),
            };
            if let Err(err) = self.bus.send(request, MessageSender::default()).await {
                tracing::warn!("Quick save failed to send: {err}");
            }
        }

        self.state.lock().await.visible = false;
        if let Err(err) = self.host.dispatch(HostCommand::ClosePopup).await {
            tracing::warn!("Could not close popup: {err}");
        }
    }

    async fn logout(&self) {
        if let Err(err) = self.store.clear().await {
            tracing::error!("Logout failed to clear credential: {err}");
        }
        self.refresh().await;
    }

    fn render(state: &PopupState) -> PopupViewModel {
        PopupViewModel {
            view: state.view,
            current_tab: state.current_tab.clone(),
            trip_options: trip_options(&state.trips),
            submitting: state.submitting,
        }
    }

    async fn publish(&self, model: PopupViewModel) {
        if let Err(err) = self
            .host
            .dispatch(HostCommand::PopupView { view: model })
            .await
        {
            tracing::warn!("Popup render push failed: {err}");
        }
    }
}

/// Dropdown options for the trip selector.
pub fn trip_options(trips: &[TripSummary]) -> Vec<TripOption> {
    if trips.is_empty() {
        return vec![TripOption {
            trip_id: None,
            label: "No trips yet".to_string(),
            enabled: false,
        }];
    }
    trips
        .iter()
        .map(|trip| TripOption {
            trip_id: Some(trip.id.clone()),
            label: trip.name.clone(),
            enabled: true,
        })
        .collect()
}
