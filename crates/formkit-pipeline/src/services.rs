//! External service seams
//!
//! The pipeline never reaches for ambient singletons: every collaborator is
//! passed in through [`Services`] and can be swapped for a fake in tests.
//!
//! - [`SessionProvider`]: who is signed in
//! - [`BlobStorage`]: attachment bytes
//! - [`DocumentStore`]: merge-writes of records
//! - [`Notifier`]: fire-and-forget user notifications
//! - [`Clock`]: submission timestamps

use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use formkit_schema::PersistencePath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    path: String,
}

impl BlobRef {
    /// Reference the blob stored at `path`
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Destination path the blob was written to
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// One value of a persisted document
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentValue {
    /// Concrete value
    Value(serde_json::Value),
    /// Replaced by the store's own clock at write time
    ServerTimestamp,
}

impl From<serde_json::Value> for DocumentValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

/// Record handed to [`DocumentStore::merge_write`]
pub type Document = IndexMap<String, DocumentValue>;

/// Current session
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Signed-in user, if any
    async fn current_user(&self) -> Option<UserId>;
}

/// Binary object storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` at `path`, replacing any previous object
    async fn upload(&self, bytes: Bytes, path: &str) -> Result<BlobRef, StorageError>;

    /// URL from which the stored object can be fetched
    async fn retrievable_url(&self, blob: &BlobRef) -> Result<String, StorageError>;

    /// Remove the object at `path`
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Document database
///
/// `merge_write` updates only the fields present in the document and leaves
/// every other stored field untouched, so repeating a write is harmless.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Merge `document` into the document at `path`, creating it if needed
    async fn merge_write(&self, path: &PersistencePath, document: Document) -> Result<(), StorageError>;
}

/// User-facing notification surface
pub trait Notifier: Send + Sync {
    /// Show a failure message
    fn notify_error(&self, message: &str);

    /// Show a success message
    fn notify_success(&self, message: &str);
}

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// [`Clock`] backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Bundle of collaborators handed to a pipeline
#[derive(Clone)]
pub struct Services {
    /// Session used to gate I/O
    pub session: Arc<dyn SessionProvider>,
    /// Attachment storage
    pub blobs: Arc<dyn BlobStorage>,
    /// Record storage
    pub documents: Arc<dyn DocumentStore>,
    /// Notification surface
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Bundle the four services
    pub fn new(
        session: Arc<dyn SessionProvider>,
        blobs: Arc<dyn BlobStorage>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            blobs,
            documents,
            notifier,
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn blob_ref_keeps_path() {
        let blob = BlobRef::new("gallery/cat.jpg-1");
        assert_eq!(blob.path(), "gallery/cat.jpg-1");
    }
}
