//! Local bridge between the browser shim and the coordination core
//!
//! The shim connects over a WebSocket, streams `HostEvent`s in, and receives
//! `HostCommand`s back. The core never talks to the browser any other way.

pub mod connection;
pub mod server;

pub use server::{create_router, serve};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::host::{HostCommand, HostEvent, HostShell};

/// Shared bridge state: connected shims plus the inbound event queue.
pub struct BridgeState {
    connections: RwLock<HashMap<String, mpsc::UnboundedSender<HostCommand>>>,
    events_tx: mpsc::UnboundedSender<HostEvent>,
}

impl BridgeState {
    /// Create the bridge state and the receiving end of its event queue.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HostEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                connections: RwLock::new(HashMap::new()),
                events_tx,
            }),
            events_rx,
        )
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub(crate) fn forward_event(&self, event: HostEvent) {
        if self.events_tx.send(event).is_err() {
            tracing::error!("Event dispatcher is gone; dropping host event");
        }
    }

    pub(crate) async fn register(&self, id: String, tx: mpsc::UnboundedSender<HostCommand>) {
        self.connections.write().await.insert(id, tx);
    }

    pub(crate) async fn unregister(&self, id: &str) {
        self.connections.write().await.remove(id);
    }

    /// Send a command to every connected shim.
    pub async fn broadcast(&self, command: &HostCommand) -> anyhow::Result<()> {
        let connections = self.connections.read().await;
        if connections.is_empty() {
            anyhow::bail!("no browser shim connected");
        }
        for tx in connections.values() {
            // A dropped sender means the connection is going away; its
            // handler unregisters it
            let _ = tx.send(command.clone());
        }
        Ok(())
    }
}

/// `HostShell` that ships commands over the bridge.
pub struct BridgeHost {
    state: Arc<BridgeState>,
}

impl BridgeHost {
    pub fn new(state: Arc<BridgeState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl HostShell for BridgeHost {
    async fn dispatch(&self, command: HostCommand) -> anyhow::Result<()> {
        self.state.broadcast(&command).await
    }
}
