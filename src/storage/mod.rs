//! Credential storage for the extension's single auth slot

pub mod file;
pub mod keyring;
pub mod memory;

// Re-export commonly used items
pub use file::FileCredentialStore;
pub use keyring::KeyringCredentialStore;
pub use memory::MemoryCredentialStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// The one credential pair minted by the web app.
///
/// Zero or one instance exists at any time; every delivery carries the
/// complete pair, so concurrent writers resolve via last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub auth_token: String,
    pub user_id: String,
}

impl Credential {
    pub fn new(auth_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            user_id: user_id.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Keyring error: {0}")]
    Keyring(#[from] ::keyring::Error),
    #[error("Data directory unavailable")]
    NoDataDir,
}

/// Single source of truth for authentication state.
///
/// Every component re-derives auth status from here; nothing caches it.
/// Backends publish each change on a watch channel so ephemeral contexts
/// (the popup) can re-sync without polling.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<Credential>, StoreError>;
    async fn set(&self, credential: Credential) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
    /// Subscribe to credential changes; the receiver holds the latest value.
    fn subscribe(&self) -> watch::Receiver<Option<Credential>>;
}
