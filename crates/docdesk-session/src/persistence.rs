//! The single persisted session record.

use async_trait::async_trait;
use docdesk_common::{DocdeskError, Identity, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::fs;
use tracing::debug;

/// Where the current identity survives restarts. An absent record means Anonymous.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn load(&self) -> Result<Option<Identity>>;
    async fn save(&self, identity: &Identity) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Identity serialized as JSON in one file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, action: &str, err: std::io::Error) -> DocdeskError {
        DocdeskError::Storage(format!("failed to {} {}: {}", action, self.path.display(), err))
    }
}

#[async_trait]
impl SessionPersistence for JsonFileStore {
    async fn load(&self) -> Result<Option<Identity>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.storage_error("read", e)),
        }
    }

    async fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.storage_error("create directory for", e))?;
        }

        // Write-then-rename so a crash never leaves a half-written record.
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(identity)?;
        fs::write(&tmp, bytes).await.map_err(|e| self.storage_error("write", e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| self.storage_error("replace", e))?;
        debug!(path = %self.path.display(), "session record saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.storage_error("remove", e)),
        }
    }
}

/// In-process record, for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Identity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self { slot: Mutex::new(Some(identity)) }
    }

    /// What is currently persisted.
    pub fn peek(&self) -> Option<Identity> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl SessionPersistence for MemoryStore {
    async fn load(&self) -> Result<Option<Identity>> {
        Ok(self.peek())
    }

    async fn save(&self, identity: &Identity) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}
