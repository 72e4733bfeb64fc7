//! Typed document handle with per-document serialization
//!
//! Every access to a document goes through its own async mutex, so a
//! load-mutate-save cycle is atomic with respect to other callers of the
//! same document. The backend's document lock extends that to other
//! processes sharing the data directory. Different documents never contend.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::RecordStore;
use crate::error::Result;

type DefaultFn<T> = Box<dyn Fn() -> T + Send + Sync>;

pub struct Document<T> {
    name: String,
    store: RecordStore,
    default: DefaultFn<T>,
    lock: Mutex<()>,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Send,
{
    pub fn new(
        store: RecordStore,
        name: impl Into<String>,
        default: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            default: Box::new(default),
            lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fresh snapshot of the persisted document.
    ///
    /// Takes the lock as well: healing an absent document writes it, and
    /// that write must not land on top of a concurrent mutation.
    pub async fn read(&self) -> T {
        let _guard = self.lock.lock().await;
        // Lock failure is already logged; a read still proceeds
        let _held = self.store.lock(&self.name).await.ok();
        self.store.load(&self.name, (self.default)()).await
    }

    /// Load, apply `f`, and save if `f` succeeded and changed the document.
    ///
    /// If the document cannot be read, or `f` fails, nothing is written.
    /// If the save fails the mutation is discarded and the error returned;
    /// the persisted document is the pre-mutation one.
    pub async fn mutate<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _guard = self.lock.lock().await;
        let _held = self.store.lock(&self.name).await?;
        let mut doc = self
            .store
            .load_for_update(&self.name, (self.default)())
            .await?;
        let before = doc.clone();

        let out = f(&mut doc)?;

        if doc != before {
            self.store.save(&self.name, &doc).await?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::store::MemoryBackend;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn counter_doc() -> (Arc<MemoryBackend>, Arc<Document<u64>>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::new(backend.clone());
        (backend, Arc::new(Document::new(store, "counter", || 0u64)))
    }

    #[tokio::test]
    async fn test_mutate_persists() {
        let (backend, doc) = counter_doc();
        let out = doc
            .mutate(|n| {
                *n += 5;
                Ok(*n)
            })
            .await
            .unwrap();
        assert_eq!(out, 5);
        assert_eq!(backend.raw("counter").await.unwrap(), b"5".to_vec());
        assert_eq!(doc.read().await, 5);
    }

    #[tokio::test]
    async fn test_failed_mutation_is_not_saved() {
        let (_backend, doc) = counter_doc();
        doc.mutate(|n| {
            *n = 3;
            Ok(())
        })
        .await
        .unwrap();

        let err = doc
            .mutate(|n| {
                *n = 100;
                Err::<(), _>(LedgerError::InvalidAmount)
            })
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount);
        assert_eq!(doc.read().await, 3);
    }

    #[tokio::test]
    async fn test_unchanged_document_is_not_written() {
        let (backend, doc) = counter_doc();
        doc.read().await; // seeds "0"

        backend.set_fail_writes(true);
        // no-op mutation must not touch the backend
        doc.mutate(|_| Ok(())).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_failure_discards_mutation() {
        let (backend, doc) = counter_doc();
        doc.mutate(|n| {
            *n = 1;
            Ok(())
        })
        .await
        .unwrap();

        backend.set_fail_writes(true);
        assert!(
            doc.mutate(|n| {
                *n += 1;
                Ok(())
            })
            .await
            .is_err()
        );
        backend.set_fail_writes(false);

        assert_eq!(doc.read().await, 1);
    }

    #[tokio::test]
    async fn test_read_error_aborts_mutation() {
        let backend = Arc::new(MemoryBackend::new());
        let store = RecordStore::new(backend.clone());
        let users: Document<BTreeMap<u64, u64>> = Document::new(store, "users", BTreeMap::new);

        for id in 1..=3 {
            users
                .mutate(|doc| {
                    doc.insert(id, 100);
                    Ok(())
                })
                .await
                .unwrap();
        }
        let before = backend.raw("users").await.unwrap();

        backend.set_fail_reads(true);
        let err = users
            .mutate(|doc| {
                doc.insert(4, 1);
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert!(users.read().await.is_empty());
        backend.set_fail_reads(false);

        assert_eq!(backend.raw("users").await.unwrap(), before);
        assert_eq!(users.read().await.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writers_in_separate_stores_do_not_lose_updates() {
        let dir = format!("target/test_document_shared_{}", std::process::id());
        let _ = std::fs::remove_dir_all(&dir);

        // one store per writer, as with the bot and the admin CLI
        let writers: Vec<Arc<Document<u64>>> = (0..2)
            .map(|_| Arc::new(Document::new(RecordStore::file(&dir), "counter", || 0u64)))
            .collect();

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let doc = writers[i % 2].clone();
                tokio::spawn(async move {
                    doc.mutate(|n| {
                        *n += 1;
                        Ok(())
                    })
                    .await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert_eq!(writers[0].read().await, 40);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_serialized() {
        let (_backend, doc) = counter_doc();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let doc = doc.clone();
                tokio::spawn(async move {
                    doc.mutate(|n| {
                        *n += 1;
                        Ok(())
                    })
                    .await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert_eq!(doc.read().await, 50);
    }
}
