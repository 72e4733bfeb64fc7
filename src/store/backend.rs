//! Storage backends - raw named byte blobs
//!
//! A backend knows nothing about JSON or defaults. It reads the full
//! contents of a named resource and replaces them atomically.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Full contents of `name`, or `None` if it does not exist.
    async fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Replace the contents of `name`. Readers observe either the old or
    /// the new bytes, never a prefix.
    async fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()>;

    /// Exclusive hold on `name` against other holders of the same storage,
    /// including other processes. Backends private to one process need no
    /// extra locking.
    async fn lock(&self, _name: &str) -> io::Result<DocumentLock> {
        Ok(DocumentLock::unlocked())
    }
}

/// Held for the duration of a load-mutate-save; released on drop.
#[must_use]
pub struct DocumentLock {
    _file: Option<std::fs::File>,
}

impl DocumentLock {
    pub fn unlocked() -> Self {
        Self { _file: None }
    }
}

// ============================================================
// File Backend
// ============================================================

/// One `<name>.json` file per document under `data_dir`.
///
/// Write protocol:
/// 1. Write bytes to `.<name>.<uuid>.tmp` in the same directory
/// 2. fsync the temp file
/// 3. Atomic rename over `<name>.json`
/// 4. fsync `data_dir` so the rename itself survives power loss
///
/// A crash before step 3 leaves the previous document untouched.
///
/// Writers in different processes (bot and admin CLI) coordinate through
/// an advisory lock on `.<name>.lock`.
pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", name))
    }

    pub fn lock_path_for(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!(".{}.lock", name))
    }

    async fn write_temp(&self, tmp_path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = tokio::fs::File::create(tmp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let tmp_path = self
            .data_dir
            .join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

        let result = match self.write_temp(&tmp_path, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp_path, self.path_for(name)).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return result;
        }

        // The new contents are already visible; only durability of the rename is in doubt
        if let Err(e) = sync_dir(&self.data_dir).await {
            tracing::warn!(target: "STORE", document = name, error = %e, "directory fsync failed");
        }
        Ok(())
    }

    async fn lock(&self, name: &str) -> io::Result<DocumentLock> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.lock_path_for(name);

        let file = tokio::task::spawn_blocking(move || -> io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock()?;
            Ok(file)
        })
        .await
        .map_err(io::Error::other)??;

        Ok(DocumentLock { _file: Some(file) })
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

// ============================================================
// Memory Backend
// ============================================================

/// In-process backend for tests and embedding without a filesystem.
#[derive(Default)]
pub struct MemoryBackend {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes currently stored under `name`
    pub async fn raw(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(name).cloned()
    }

    /// Overwrite raw bytes directly, bypassing any document logic
    pub async fn put_raw(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.blobs.write().await.insert(name.to_string(), bytes.into());
    }

    /// Make every subsequent write fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail with an I/O error
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::other("memory backend read disabled"));
        }
        Ok(self.blobs.read().await.get(name).cloned())
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("memory backend write disabled"));
        }
        self.blobs
            .write()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
