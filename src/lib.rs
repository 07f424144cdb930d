//! NovaTrek Clipper - capture companion core
//!
//! Coordination core for the NovaTrek web clipper: credential relay,
//! capture pipeline, badge state machine and popup controller, fronted by a
//! local WebSocket bridge the browser shim connects to.

pub mod api;
pub mod background;
pub mod bridge;
pub mod content;
pub mod host;
pub mod messages;
pub mod popup;
pub mod relay;
pub mod settings;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::NovaTrekClient;
use background::Coordinator;
use content::ContentAgent;
use host::{HostEvent, HostShell};
use messages::{MessageBus, MessageSender};
use popup::PopupController;
use settings::ClipperSettings;
use storage::{CredentialStore, FileCredentialStore};

/// Initialize logging
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("novatrek_clipper=debug".parse().unwrap()),
        )
        .init();
}

pub async fn run() -> anyhow::Result<()> {
    init_logging();

    let settings = ClipperSettings::load();
    let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::open_default()?);
    let listener = tokio::net::TcpListener::bind(&settings.bridge_addr).await?;

    tracing::info!("NovaTrek Clipper starting");
    serve(listener, settings, store).await
}

/// Wire every component together and serve the bridge on `listener`.
pub async fn serve(
    listener: tokio::net::TcpListener,
    settings: ClipperSettings,
    store: Arc<dyn CredentialStore>,
) -> anyhow::Result<()> {
    let api = Arc::new(NovaTrekClient::new(&settings.api_base_url));
    let (bridge_state, mut events) = bridge::BridgeState::new();
    let host: Arc<dyn HostShell> = Arc::new(bridge::BridgeHost::new(bridge_state.clone()));

    let coordinator = Coordinator::spawn(
        store.clone(),
        api.clone(),
        host.clone(),
        settings.clone(),
    );
    let bus: Arc<dyn MessageBus> = coordinator.clone();
    let content = ContentAgent::new(bus.clone(), store.clone(), host.clone(), settings.clone());
    let popup = PopupController::spawn(bus, api, store, host);

    let router = coordinator.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            dispatch_host_event(&event, &router, &content, &popup).await;
        }
    });

    bridge::server::serve(listener, bridge_state).await
}

/// Route one host event to the context that owns it.
async fn dispatch_host_event(
    event: &HostEvent,
    coordinator: &Arc<Coordinator>,
    content: &Arc<ContentAgent>,
    popup: &Arc<PopupController>,
) {
    match event {
        HostEvent::Installed
        | HostEvent::TabCompleted { .. }
        | HostEvent::MenuClicked { .. } => coordinator.handle_host_event(event).await,
        HostEvent::Message { tab_id, request } => {
            let sender = MessageSender { tab_id: *tab_id };
            let response = coordinator.handle_request(request.clone(), sender).await;
            tracing::trace!(?response, "Handled shim RPC");
        }
        HostEvent::PageLoaded { .. }
        | HostEvent::AuthElement { .. }
        | HostEvent::PageMessage { .. }
        | HostEvent::PageEvent { .. }
        | HostEvent::QuickSaveClicked { .. }
        | HostEvent::TabClosed { .. } => content.handle_host_event(event).await,
        HostEvent::PopupOpened { .. }
        | HostEvent::PopupVisibility { .. }
        | HostEvent::PopupSubmit { .. }
        | HostEvent::PopupQuickSave
        | HostEvent::PopupLogout => popup.handle_host_event(event).await,
    }
}
