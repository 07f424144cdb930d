//! Secure credential storage using the system keyring

use async_trait::async_trait;
use keyring::Entry;
use tokio::sync::watch;

use super::{Credential, CredentialStore, StoreError};

const SERVICE_NAME: &str = "com.novatrek.clipper";
const TOKEN_KEY: &str = "auth-token";
const USER_KEY: &str = "user-id";

/// Credential store backed by the OS keyring.
///
/// Keeps the token out of plain files; availability depends on the platform
/// keyring, so the file store remains the default backend.
pub struct KeyringCredentialStore {
    service: &'static str,
    changes: watch::Sender<Option<Credential>>,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        let service = SERVICE_NAME;
        let initial = read_pair(service).ok().flatten();
        let (changes, _) = watch::channel(initial);
        Self { service, changes }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read_entry(service: &str, key: &str) -> Result<Option<String>, StoreError> {
    let entry = Entry::new(service, key)?;
    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn delete_entry(service: &str, key: &str) -> Result<(), StoreError> {
    let entry = Entry::new(service, key)?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn read_pair(service: &str) -> Result<Option<Credential>, StoreError> {
    let Some(auth_token) = read_entry(service, TOKEN_KEY)? else {
        return Ok(None);
    };
    if auth_token.is_empty() {
        return Ok(None);
    }
    let user_id = read_entry(service, USER_KEY)?.unwrap_or_default();
    Ok(Some(Credential {
        auth_token,
        user_id,
    }))
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self) -> Result<Option<Credential>, StoreError> {
        read_pair(self.service)
    }

    async fn set(&self, credential: Credential) -> Result<(), StoreError> {
        Entry::new(self.service, TOKEN_KEY)?.set_password(&credential.auth_token)?;
        Entry::new(self.service, USER_KEY)?.set_password(&credential.user_id)?;
        tracing::debug!("Stored credential for user {}", credential.user_id);
        self.changes.send_replace(Some(credential));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        delete_entry(self.service, TOKEN_KEY)?;
        delete_entry(self.service, USER_KEY)?;
        tracing::debug!("Cleared stored credential");
        self.changes.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keyring_round_trip() {
        let store = KeyringCredentialStore::new();

        // Clean up any existing entry
        let _ = store.clear().await;

        // Platforms without a keyring backend can't run this test
        if let Err(StoreError::Keyring(_)) =
            store.set(Credential::new("test-token", "test-user")).await
        {
            return;
        }

        let loaded = store.get().await.expect("Failed to get").unwrap();
        assert_eq!(loaded.auth_token, "test-token");
        assert_eq!(loaded.user_id, "test-user");

        store.clear().await.expect("Failed to clear");
        assert!(store.get().await.unwrap().is_none());
    }
}
