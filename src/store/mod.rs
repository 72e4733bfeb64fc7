//! Durable Record Store
//!
//! Named JSON documents, read and written as a unit:
//! - `load` never fails: absent, empty or unparseable documents are reset
//!   to the supplied default, which is persisted
//! - `save` replaces the whole document atomically (see [`FileBackend`])
//! - `load_for_update` is the same, except an unreadable backend is an error
//! - `lock` serializes writers that share the backend but not the process
//! - no caching: every load goes back to the backend

mod backend;
mod document;

pub use backend::{DocumentLock, FileBackend, MemoryBackend, StorageBackend};
pub use document::Document;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

use crate::error::{LedgerError, Result};

#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// File-backed store rooted at `data_dir`
    pub fn file(data_dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FileBackend::new(data_dir)))
    }

    /// Load `name`, healing it to `default` when it cannot be used as-is.
    ///
    /// A backend read error serves `default` without touching the stored
    /// document.
    pub async fn load<T>(&self, name: &str, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        match self.backend.read(name).await {
            Ok(bytes) => self.heal(name, bytes, default).await,
            Err(e) => {
                tracing::error!(
                    target: "STORE",
                    document = name,
                    error = %e,
                    "read failed, serving default without overwriting"
                );
                default
            }
        }
    }

    /// Load `name` for a read-modify-write cycle.
    ///
    /// Heals like [`RecordStore::load`], but a backend read error is
    /// returned as `Persistence` instead of being replaced by `default`:
    /// the caller is about to save, and must not save over an intact
    /// document it could not read.
    pub async fn load_for_update<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let bytes = self.backend.read(name).await.map_err(|e| {
            tracing::error!(
                target: "STORE",
                document = name,
                error = %e,
                "read failed, update aborted"
            );
            LedgerError::from(e)
        })?;
        Ok(self.heal(name, bytes, default).await)
    }

    /// Exclusive hold on `name` across processes sharing the backend.
    pub async fn lock(&self, name: &str) -> Result<DocumentLock> {
        self.backend.lock(name).await.map_err(|e| {
            tracing::warn!(target: "STORE", document = name, error = %e, "lock failed");
            LedgerError::from(e)
        })
    }

    /// Overwrite `name` with `doc`.
    pub async fn save<T>(&self, name: &str, doc: &T) -> Result<()>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec_pretty(doc)?;
        self.backend.write(name, &bytes).await?;
        tracing::debug!(target: "STORE", document = name, bytes = bytes.len(), "saved");
        Ok(())
    }

    async fn heal<T>(&self, name: &str, bytes: Option<Vec<u8>>, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let Some(bytes) = bytes else {
            tracing::debug!(target: "STORE", document = name, "absent, seeding default");
            self.reset(name, &default).await;
            return default;
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            tracing::warn!(target: "STORE", document = name, "empty, resetting to default");
            self.reset(name, &default).await;
            return default;
        }

        match serde_json::from_slice::<T>(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    target: "STORE",
                    document = name,
                    error = %e,
                    "corrupt, resetting to default"
                );
                self.reset(name, &default).await;
                default
            }
        }
    }

    async fn reset<T: Serialize>(&self, name: &str, default: &T) {
        if let Err(e) = self.save(name, default).await {
            tracing::warn!(
                target: "STORE",
                document = name,
                error = %e,
                "failed to persist default"
            );
        }
    }
}
