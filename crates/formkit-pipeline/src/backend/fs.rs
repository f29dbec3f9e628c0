//! Local directory services
//!
//! Blobs are plain files under a root directory. Documents are JSON files at
//! `<root>/<collection>/<document>.json`, merged on every write.

use super::{merge_into, resolve_document};
use crate::error::StorageError;
use crate::services::{BlobRef, BlobStorage, Clock, Document, DocumentStore, SystemClock};
use async_trait::async_trait;
use bytes::Bytes;
use formkit_schema::PersistencePath;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Join a relative storage path onto `root`, refusing anything that escapes it
fn contained(root: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    let candidate = Path::new(relative);
    let safe = !relative.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(root.join(candidate))
    } else {
        Err(StorageError::InvalidPath(relative.to_owned()))
    }
}

fn not_found_or_io(path: &Path, source: std::io::Error) -> StorageError {
    if source.kind() == ErrorKind::NotFound {
        StorageError::NotFound(path.display().to_string())
    } else {
        StorageError::io_error(path, source)
    }
}

/// Blob storage in a local directory, served as `file://` URLs
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    /// Store blobs under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, bytes: Bytes, path: &str) -> Result<BlobRef, StorageError> {
        let target = contained(&self.root, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io_error(parent, e))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| StorageError::io_error(&target, e))?;

        tracing::trace!(path = %target.display(), size = bytes.len(), "Blob written");
        Ok(BlobRef::new(path))
    }

    async fn retrievable_url(&self, blob: &BlobRef) -> Result<String, StorageError> {
        let target = contained(&self.root, blob.path())?;
        tokio::fs::metadata(&target)
            .await
            .map_err(|e| not_found_or_io(&target, e))?;
        Ok(format!("file://{}", target.display()))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = contained(&self.root, path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| not_found_or_io(&target, e))
    }
}

/// Document store writing one JSON file per document
pub struct JsonDocumentStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    // serializes read-merge-write cycles
    write_lock: Mutex<()>,
}

impl JsonDocumentStore {
    /// Store documents under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    /// Store documents under `root`, stamping with `clock`
    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// File holding the document at `path`
    ///
    /// # Errors
    /// `InvalidPath` when either segment is not a single path component.
    pub fn file_for(&self, path: &PersistencePath) -> Result<PathBuf, StorageError> {
        for segment in [&path.collection, &path.document_id] {
            if segment.contains(['/', '\\']) {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
        }
        contained(&self.root, &format!("{}/{}.json", path.collection, path.document_id))
    }

    /// Read a stored document
    ///
    /// # Errors
    /// IO or decode failures; a missing document is `Ok(None)`.
    pub async fn read(&self, path: &PersistencePath) -> Result<Option<Value>, StorageError> {
        let file = self.file_for(path)?;
        match tokio::fs::read(&file).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io_error(&file, e)),
        }
    }
}

impl std::fmt::Debug for JsonDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDocumentStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn merge_write(&self, path: &PersistencePath, document: Document) -> Result<(), StorageError> {
        let file = self.file_for(path)?;
        let incoming = resolve_document(document, self.clock.now_millis());

        let _guard = self.write_lock.lock().await;
        let mut stored = match self.read(path).await? {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(StorageError::Backend(format!(
                    "{} does not hold a JSON object",
                    file.display()
                )))
            }
            None => Map::new(),
        };
        merge_into(&mut stored, incoming);

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io_error(parent, e))?;
        }
        let encoded = serde_json::to_vec_pretty(&Value::Object(stored))?;
        tokio::fs::write(&file, encoded)
            .await
            .map_err(|e| StorageError::io_error(&file, e))?;

        tracing::debug!(file = %file.display(), "Document merged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::DocumentValue;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn blobs_live_under_root() {
        let dir = TempDir::new().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        let blob = storage
            .upload(Bytes::from_static(b"\x89PNG"), "gallery/cat.png-42")
            .await
            .unwrap();
        let url = storage.retrievable_url(&blob).await.unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("gallery/cat.png-42"));
        assert_eq!(std::fs::read(dir.path().join("gallery/cat.png-42")).unwrap(), b"\x89PNG");

        storage.delete("gallery/cat.png-42").await.unwrap();
        assert!(matches!(
            storage.delete("gallery/cat.png-42").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn escaping_paths_are_refused() {
        let dir = TempDir::new().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        for path in ["../outside", "/etc/passwd", ""] {
            assert!(
                matches!(
                    storage.upload(Bytes::new(), path).await,
                    Err(StorageError::InvalidPath(_))
                ),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn json_documents_merge() {
        let dir = TempDir::new().unwrap();
        let store = JsonDocumentStore::new(dir.path());
        let path = PersistencePath::new("forms", "contact");

        let mut first = Document::new();
        first.insert("title".into(), DocumentValue::Value(json!("one")));
        first.insert("photos".into(), DocumentValue::Value(json!(["a"])));
        store.merge_write(&path, first).await.unwrap();

        let mut second = Document::new();
        second.insert("title".into(), DocumentValue::Value(json!("two")));
        second.insert("createdAt".into(), DocumentValue::ServerTimestamp);
        store.merge_write(&path, second).await.unwrap();

        let stored = store.read(&path).await.unwrap().unwrap();
        assert_eq!(stored["title"], "two");
        assert_eq!(stored["photos"], json!(["a"]));
        assert!(stored["createdAt"].is_string());
        assert!(dir.path().join("forms/contact.json").exists());
    }

    #[tokio::test]
    async fn missing_document_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonDocumentStore::new(dir.path());
        assert!(store
            .read(&PersistencePath::new("forms", "nobody"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn document_segments_must_be_single_components() {
        let store = JsonDocumentStore::new("/tmp/unused");
        assert!(store.file_for(&PersistencePath::new("a/b", "c")).is_err());
        assert!(store.file_for(&PersistencePath::new("..", "c")).is_err());
    }
}
