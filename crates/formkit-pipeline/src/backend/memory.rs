//! Process-local services

use super::{merge_into, resolve_document};
use crate::error::StorageError;
use crate::services::{
    BlobRef, BlobStorage, Clock, Document, DocumentStore, Notifier, SessionProvider, SystemClock, UserId,
};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use formkit_schema::PersistencePath;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Blob storage held in a map
#[derive(Debug, Default)]
pub struct InMemoryBlobStorage {
    objects: DashMap<String, Bytes>,
}

impl InMemoryBlobStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes at `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.objects.get(path).map(|b| b.value().clone())
    }

    /// Whether `path` holds an object
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// No objects stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Stored paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn upload(&self, bytes: Bytes, path: &str) -> Result<BlobRef, StorageError> {
        if path.is_empty() {
            return Err(StorageError::InvalidPath(path.to_owned()));
        }
        self.objects.insert(path.to_owned(), bytes);
        Ok(BlobRef::new(path))
    }

    async fn retrievable_url(&self, blob: &BlobRef) -> Result<String, StorageError> {
        if self.objects.contains_key(blob.path()) {
            Ok(format!("memory://{}", blob.path()))
        } else {
            Err(StorageError::NotFound(blob.path().to_owned()))
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_owned()))
    }
}

/// Document store held in a map, keyed by `collection/document`
pub struct InMemoryDocumentStore {
    documents: DashMap<String, Map<String, Value>>,
    clock: Arc<dyn Clock>,
    writes: AtomicUsize,
}

impl InMemoryDocumentStore {
    /// Empty store using the system clock for server timestamps
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store using `clock` for server timestamps
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: DashMap::new(),
            clock,
            writes: AtomicUsize::new(0),
        }
    }

    /// Stored document
    #[must_use]
    pub fn get(&self, path: &PersistencePath) -> Option<Value> {
        self.documents
            .get(&path.to_string())
            .map(|d| Value::Object(d.value().clone()))
    }

    /// Number of `merge_write` calls that succeeded
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("documents", &self.documents.len())
            .field("writes", &self.write_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn merge_write(&self, path: &PersistencePath, document: Document) -> Result<(), StorageError> {
        let incoming = resolve_document(document, self.clock.now_millis());
        merge_into(self.documents.entry(path.to_string()).or_default().value_mut(), incoming);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Session with a fixed user, or none
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user: Option<UserId>,
}

impl StaticSession {
    /// Session signed in as `user`
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    /// Session with nobody signed in
    #[must_use]
    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }
}

/// Notifier that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        tracing::error!(target: "formkit::notify", "{}", message);
    }

    fn notify_success(&self, message: &str) {
        tracing::info!(target: "formkit::notify", "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::DocumentValue;
    use serde_json::json;

    struct Epoch;

    impl Clock for Epoch {
        fn now_millis(&self) -> i64 {
            0
        }
    }

    #[tokio::test]
    async fn blob_round_trip_and_delete() {
        let storage = InMemoryBlobStorage::new();
        let blob = storage.upload(Bytes::from_static(b"abc"), "a/b.png-1").await.unwrap();

        assert_eq!(storage.retrievable_url(&blob).await.unwrap(), "memory://a/b.png-1");
        assert_eq!(storage.get("a/b.png-1").unwrap(), Bytes::from_static(b"abc"));

        storage.delete("a/b.png-1").await.unwrap();
        assert!(storage.is_empty());
        assert!(matches!(
            storage.retrievable_url(&blob).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn documents_merge_across_writes() {
        let store = InMemoryDocumentStore::with_clock(Arc::new(Epoch));
        let path = PersistencePath::new("forms", "contact");

        let mut first = Document::new();
        first.insert("title".into(), DocumentValue::Value(json!("one")));
        first.insert("body".into(), DocumentValue::Value(json!("kept")));
        store.merge_write(&path, first).await.unwrap();

        let mut second = Document::new();
        second.insert("title".into(), DocumentValue::Value(json!("two")));
        second.insert("createdAt".into(), DocumentValue::ServerTimestamp);
        store.merge_write(&path, second).await.unwrap();

        assert_eq!(
            store.get(&path).unwrap(),
            json!({"title": "two", "body": "kept", "createdAt": "1970-01-01T00:00:00.000Z"})
        );
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn static_session_reports_user() {
        assert_eq!(
            StaticSession::signed_in(UserId("ada".into())).current_user().await,
            Some(UserId("ada".into()))
        );
        assert_eq!(StaticSession::anonymous().current_user().await, None);
    }
}
