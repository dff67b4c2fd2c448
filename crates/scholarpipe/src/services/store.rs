//! Record store collaborator interface and the in-process implementation.
//!
//! The pipeline treats persistence as an external collaborator: the
//! [`RecordStore`] trait names exactly the operations the ingestion gate
//! needs, and everything upstream holds an `Arc<dyn RecordStore>`. Methods
//! return boxed futures so the trait stays object-safe.
//!
//! [`MemoryStore`] is the in-process implementation, used by the server when
//! `STORE_URI` is `memory://` and by every test.

use crate::models::record::StoredRecord;
use ahash::AHashMap;
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation failed: {0}")]
    Operation(String),
}

/// Whether an upsert created a new document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

fn normalize_key(title: &str, provider: &str) -> (String, String) {
    (
        title.trim().to_lowercase(),
        provider.trim().to_lowercase(),
    )
}

/// Operations the ingestion gate requires from a record store.
///
/// Implementations must serialize concurrent upserts for the same key; the
/// gate treats a duplicate-insert race as equivalent to an update.
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Looks up a record by normalized (title, provider).
    fn find_by_key<'a>(
        &'a self,
        title: &'a str,
        provider: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StoreError>>;

    /// Looks up a record by exact application URL.
    fn find_by_url<'a>(
        &'a self,
        application_url: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StoreError>>;

    /// Inserts or replaces the record keyed by its normalized title+provider.
    fn upsert<'a>(
        &'a self,
        record: StoredRecord,
    ) -> BoxFuture<'a, Result<UpsertOutcome, StoreError>>;

    /// All records currently flagged active.
    fn find_active<'a>(&'a self) -> BoxFuture<'a, Result<Vec<StoredRecord>, StoreError>>;
}

/// In-memory record store keyed by normalized (title, provider) with a
/// secondary application-URL index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    by_key: AHashMap<(String, String), StoredRecord>,
    url_index: AHashMap<String, (String, String)>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of stored records; test convenience.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_key.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl RecordStore for MemoryStore {
    fn find_by_key<'a>(
        &'a self,
        title: &'a str,
        provider: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StoreError>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner.by_key.get(&normalize_key(title, provider)).cloned())
        })
    }

    fn find_by_url<'a>(
        &'a self,
        application_url: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredRecord>, StoreError>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let key = match inner.url_index.get(application_url) {
                Some(key) => key.clone(),
                None => return Ok(None),
            };
            Ok(inner.by_key.get(&key).cloned())
        })
    }

    fn upsert<'a>(
        &'a self,
        record: StoredRecord,
    ) -> BoxFuture<'a, Result<UpsertOutcome, StoreError>> {
        Box::pin(async move {
            let key = record.dedup_key();
            let mut inner = self.inner.write().await;
            inner
                .url_index
                .insert(record.application_url.clone(), key.clone());
            match inner.by_key.insert(key, record) {
                Some(_) => Ok(UpsertOutcome::Updated),
                None => Ok(UpsertOutcome::Inserted),
            }
        })
    }

    fn find_active<'a>(&'a self) -> BoxFuture<'a, Result<Vec<StoredRecord>, StoreError>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner
                .by_key
                .values()
                .filter(|r| r.is_active)
                .cloned()
                .collect())
        })
    }
}
