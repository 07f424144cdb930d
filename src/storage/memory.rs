//! In-memory credential store for tests and ephemeral sessions

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use super::{Credential, CredentialStore, StoreError};

/// Credential store that lives only as long as the process.
pub struct MemoryCredentialStore {
    slot: RwLock<Option<Credential>>,
    changes: watch::Sender<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            slot: RwLock::new(None),
            changes,
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.slot.read().await.clone())
    }

    async fn set(&self, credential: Credential) -> Result<(), StoreError> {
        *self.slot.write().await = Some(credential.clone());
        self.changes.send_replace(Some(credential));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.slot.write().await = None;
        self.changes.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.changes.subscribe()
    }
}
