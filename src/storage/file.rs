//! JSON-file credential storage in the platform data directory

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{Credential, CredentialStore, StoreError};

const APP_DIR_NAME: &str = "NovaTrekClipper";
const CREDENTIALS_FILENAME: &str = "credentials.json";

/// Credential store backed by a single JSON document on disk.
pub struct FileCredentialStore {
    path: PathBuf,
    changes: watch::Sender<Option<Credential>>,
}

impl FileCredentialStore {
    /// Open the store at the default data-dir location.
    pub fn open_default() -> Result<Self, StoreError> {
        let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::open(
            data_dir.join(APP_DIR_NAME).join(CREDENTIALS_FILENAME),
        ))
    }

    /// Open the store at an explicit path.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = load_credential(&path);
        let (changes, _) = watch::channel(initial);
        Self { path, changes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_credential(path: &Path) -> Option<Credential> {
    let contents = std::fs::read_to_string(path).ok()?;
    let credential: Credential = serde_json::from_str(&contents).ok()?;
    if credential.auth_token.is_empty() {
        return None;
    }
    Some(credential)
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<Credential>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let credential: Credential = serde_json::from_str(&contents)?;
                if credential.auth_token.is_empty() {
                    return Ok(None);
                }
                Ok(Some(credential))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, credential: Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_string_pretty(&credential)?;
        tokio::fs::write(&self.path, payload).await?;
        tracing::debug!("Stored credential for user {}", credential.user_id);
        self.changes.send_replace(Some(credential));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tracing::debug!("Cleared stored credential");
        self.changes.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.changes.subscribe()
    }
}
