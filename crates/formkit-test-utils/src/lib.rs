//! Testing utilities for the formkit workspace
//!
//! Shared fixtures, recording fakes and failure-injecting services.

#![allow(missing_docs)]

use async_trait::async_trait;
use bytes::Bytes;
use formkit_pipeline::backend::{InMemoryBlobStorage, InMemoryDocumentStore, StaticSession};
use formkit_pipeline::{
    BlobRef, BlobStorage, Clock, Document, DocumentStore, Notifier, Services, StorageError, UserId,
};
use formkit_schema::{FieldDescriptor, FileHandle, FormConfiguration, PersistencePath, SelectOption};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 2023-11-14T22:13:20Z
pub const FIXED_NOW: i64 = 1_700_000_000_000;

pub const SAMPLE_BLOB_PATH: &str = "uploads/contact";

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Default for FixedClock {
    fn default() -> Self {
        Self(FIXED_NOW)
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    errors: Mutex<Vec<String>>,
    successes: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().clone()
    }

    pub fn total(&self) -> usize {
        self.errors.lock().len() + self.successes.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.errors.lock().push(message.to_owned());
    }

    fn notify_success(&self, message: &str) {
        self.successes.lock().push(message.to_owned());
    }
}

/// In-memory blob storage that fails the upload with the given attempt index
#[derive(Debug)]
pub struct FailingBlobStorage {
    inner: InMemoryBlobStorage,
    fail_at: usize,
    attempts: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl FailingBlobStorage {
    pub fn fails_at(fail_at: usize) -> Self {
        Self {
            inner: InMemoryBlobStorage::new(),
            fail_at,
            attempts: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn stored(&self) -> &InMemoryBlobStorage {
        &self.inner
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl BlobStorage for FailingBlobStorage {
    async fn upload(&self, bytes: Bytes, path: &str) -> Result<BlobRef, StorageError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == self.fail_at {
            return Err(StorageError::Backend("injected upload failure".into()));
        }
        self.inner.upload(bytes, path).await
    }

    async fn retrievable_url(&self, blob: &BlobRef) -> Result<String, StorageError> {
        self.inner.retrievable_url(blob).await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.deleted.lock().push(path.to_owned());
        self.inner.delete(path).await
    }
}

/// Document store whose writes always fail
#[derive(Debug, Default)]
pub struct FailingDocumentStore {
    attempts: AtomicUsize,
}

impl FailingDocumentStore {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn merge_write(&self, path: &PersistencePath, _document: Document) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::PermissionDenied(path.to_string()))
    }
}

/// Blob storage whose uploads wait until [`GatedBlobStorage::open`] is called
#[derive(Debug)]
pub struct GatedBlobStorage {
    inner: InMemoryBlobStorage,
    gate: Semaphore,
}

impl Default for GatedBlobStorage {
    fn default() -> Self {
        Self {
            inner: InMemoryBlobStorage::new(),
            gate: Semaphore::new(0),
        }
    }
}

impl GatedBlobStorage {
    pub fn open(&self) {
        self.gate.add_permits(1024);
    }
}

#[async_trait]
impl BlobStorage for GatedBlobStorage {
    async fn upload(&self, bytes: Bytes, path: &str) -> Result<BlobRef, StorageError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.inner.upload(bytes, path).await
    }

    async fn retrievable_url(&self, blob: &BlobRef) -> Result<String, StorageError> {
        self.inner.retrievable_url(blob).await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.inner.delete(path).await
    }
}

/// Services wired to in-memory fakes, with handles kept for assertions
pub struct TestServices {
    pub blobs: Arc<InMemoryBlobStorage>,
    pub documents: Arc<InMemoryDocumentStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub session: Arc<StaticSession>,
}

impl Default for TestServices {
    fn default() -> Self {
        Self::signed_in("tester")
    }
}

impl TestServices {
    pub fn signed_in(user: &str) -> Self {
        Self::with_session(StaticSession::signed_in(UserId(user.to_owned())))
    }

    pub fn anonymous() -> Self {
        Self::with_session(StaticSession::anonymous())
    }

    fn with_session(session: StaticSession) -> Self {
        Self {
            blobs: Arc::new(InMemoryBlobStorage::new()),
            documents: Arc::new(InMemoryDocumentStore::with_clock(Arc::new(FixedClock::default()))),
            notifier: Arc::new(RecordingNotifier::default()),
            session: Arc::new(session),
        }
    }

    pub fn services(&self) -> Services {
        Services::new(
            self.session.clone(),
            self.blobs.clone(),
            self.documents.clone(),
            self.notifier.clone(),
        )
    }

    /// Same fakes, with `blobs` replacing the blob storage
    pub fn services_with_blobs(&self, blobs: Arc<dyn BlobStorage>) -> Services {
        Services::new(self.session.clone(), blobs, self.documents.clone(), self.notifier.clone())
    }

    /// Same fakes, with `documents` replacing the document store
    pub fn services_with_documents(&self, documents: Arc<dyn DocumentStore>) -> Services {
        Services::new(self.session.clone(), self.blobs.clone(), documents, self.notifier.clone())
    }
}

pub fn sample_path() -> PersistencePath {
    PersistencePath::new("submissions", "contact")
}

/// Title 3-20 required, optional description, up to 3 jpeg/png photos of 2 MB
pub fn sample_form() -> FormConfiguration {
    FormConfiguration::builder()
        .field(FieldDescriptor::text("title", "Title").required().min_length(3).max_length(20))
        .field(FieldDescriptor::multi_line("description", "Description").max_length(500))
        .field(
            FieldDescriptor::image_set("photos", "Photos")
                .max_count(3)
                .max_size_mb(2.0)
                .accept(["image/jpeg", "image/png"]),
        )
        .persist_to("submissions", "contact")
        .blob_storage_path(SAMPLE_BLOB_PATH)
        .build()
        .unwrap()
}

/// Required topic select with `tech` and `health`
pub fn topic_select() -> FieldDescriptor {
    FieldDescriptor::select(
        "topic",
        "Topic",
        [SelectOption::new("tech", "Technology"), SelectOption::new("health", "Health")],
    )
    .required()
}

pub fn file_of_size(name: &str, mime_type: &str, size: usize) -> FileHandle {
    FileHandle::new(name, mime_type, vec![0u8; size])
}

pub fn jpeg(name: &str) -> FileHandle {
    FileHandle::new(name, "image/jpeg", Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0]))
}

pub fn png(name: &str) -> FileHandle {
    FileHandle::new(name, "image/png", Bytes::from_static(b"\x89PNG\r\n\x1a\n"))
}

pub fn gif(name: &str) -> FileHandle {
    FileHandle::new(name, "image/gif", Bytes::from_static(b"GIF89a"))
}
