//! Submission pipeline
//!
//! Drives one form from a raw [`FormInput`] to a persisted record:
//!
//! 1. Reject the call if another submission is in flight
//! 2. Validate against the compiled schema
//! 3. Run `BeforeSubmit` then `OnSubmit` hooks
//! 4. Check the session when I/O will happen
//! 5. Upload attachments, one at a time, in configuration order
//! 6. Drop empty values
//! 7. Merge-write the record with a server timestamp
//! 8. Notify, release previews, run `AfterSubmit` hooks
//!
//! Validation failures are returned as [`SubmissionOutcome::Invalid`] and
//! never notify. Every other failure notifies exactly once.

use crate::error::{SelectionError, Stage, StorageError, SubmissionError};
use crate::hooks::{HookContext, HookOutcome, HookPoint, SubmitHook};
use crate::preview::{ObjectUrlPreviews, PreviewHandle, PreviewSurface, PreviewTracker, Selections};
use crate::render::{self, FormView};
use crate::sanitize::sanitize;
use crate::services::{Clock, Document, DocumentValue, Services, SystemClock};
use formkit_schema::{
    ConfigurationError, FieldDescriptor, FieldValue, FileHandle, FormConfiguration, FormInput,
    FormSchema, PersistencePath, ValidatedRecord, ValidationErrors,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;

/// Notification shown after a successful submission
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Form submitted successfully!";

/// Notification shown when upload or persistence fails
pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to submit form. Please try again.";

/// Notification shown when no user is signed in
pub const DEFAULT_UNAUTHENTICATED_MESSAGE: &str = "You must be signed in to submit this form.";

/// Pipeline behavior switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Require a signed-in user before uploading or persisting
    pub require_authentication: bool,
    /// Delete blobs uploaded by a submission that later failed
    pub cleanup_on_failure: bool,
    /// Success notification text
    pub success_message: String,
    /// Failure notification text
    pub failure_message: String,
    /// Notification text for a missing session
    pub unauthenticated_message: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            require_authentication: true,
            cleanup_on_failure: true,
            success_message: DEFAULT_SUCCESS_MESSAGE.to_owned(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_owned(),
            unauthenticated_message: DEFAULT_UNAUTHENTICATED_MESSAGE.to_owned(),
        }
    }
}

impl PipelineSettings {
    /// Set whether a session is required
    #[inline]
    #[must_use]
    pub fn with_require_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    /// Set whether uploads are rolled back on failure
    #[inline]
    #[must_use]
    pub fn with_cleanup_on_failure(mut self, cleanup: bool) -> Self {
        self.cleanup_on_failure = cleanup;
        self
    }

    /// Set the success notification
    #[inline]
    #[must_use]
    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }

    /// Set the failure notification
    #[inline]
    #[must_use]
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }
}

/// Unique id of one submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubmissionId(ulid::Ulid);

impl SubmissionId {
    /// Fresh id
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One uploaded attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedAttachment {
    /// Image-set field the file belongs to
    pub field: String,
    /// Position of the file within the field
    pub index: usize,
    /// Original file name
    pub file_name: String,
    /// Destination path in blob storage
    pub path: String,
    /// Retrievable URL stored in the record
    pub url: String,
}

/// What a successful submission did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    /// Submission id
    pub id: SubmissionId,
    /// Timestamp used in attachment destinations, ms since epoch
    pub timestamp_ms: i64,
    /// Document written, if persistence is configured
    pub path: Option<PersistencePath>,
    /// Attachments, in upload order
    pub uploads: Vec<UploadedAttachment>,
    /// Sanitized payload, without the server timestamp
    pub payload: Map<String, Value>,
}

/// Result of a submission that ran to a decision
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Record was uploaded and persisted
    Submitted(SubmissionReceipt),
    /// Input failed validation; nothing else happened
    Invalid(ValidationErrors),
}

impl SubmissionOutcome {
    /// Receipt of a successful submission
    #[must_use]
    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        match self {
            Self::Submitted(receipt) => Some(receipt),
            Self::Invalid(_) => None,
        }
    }

    /// Errors of a rejected submission
    #[must_use]
    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Submitted(_) => None,
            Self::Invalid(errors) => Some(errors),
        }
    }

    /// Whether the record was persisted
    #[inline]
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

/// Sets the in-flight flag for its lifetime
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    stage: &'a Mutex<Stage>,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, stage: &'a Mutex<Stage>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, stage })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.stage.lock() = Stage::Idle;
        self.flag.store(false, Ordering::Release);
    }
}

/// Builder for [`SubmissionPipeline`]
pub struct SubmissionPipelineBuilder {
    config: Arc<FormConfiguration>,
    services: Services,
    hooks: Vec<(HookPoint, Arc<dyn SubmitHook>)>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
    previews: Arc<dyn PreviewSurface>,
}

impl SubmissionPipelineBuilder {
    /// Register a hook; hooks at one point run in registration order
    #[must_use]
    pub fn hook(mut self, point: HookPoint, hook: impl SubmitHook + 'static) -> Self {
        self.hooks.push((point, Arc::new(hook)));
        self
    }

    /// Use a different clock for submission timestamps
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the settings
    #[must_use]
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use a different preview surface
    #[must_use]
    pub fn previews(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.previews = surface;
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    /// `MissingBlobStoragePath` when the form has an image-set field but no
    /// blob storage location.
    pub fn build(self) -> Result<SubmissionPipeline, ConfigurationError> {
        if self.config.blob_storage_path().is_none() {
            if let Some(field) = self.config.image_set_fields().next() {
                return Err(ConfigurationError::MissingBlobStoragePath {
                    field: field.name().to_owned(),
                });
            }
        }

        Ok(SubmissionPipeline {
            schema: self.config.schema(),
            config: self.config,
            services: self.services,
            hooks: self.hooks,
            clock: self.clock,
            settings: self.settings,
            previews: PreviewTracker::new(self.previews),
            in_flight: AtomicBool::new(false),
            stage: Mutex::new(Stage::Idle),
        })
    }
}

impl fmt::Debug for SubmissionPipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipelineBuilder")
            .field("fields", &self.config.fields().len())
            .field("hooks", &self.hooks.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Submits one form configuration
///
/// Owns the transient state of a form view: in-flight flag, current stage,
/// file selections and their preview handles.
pub struct SubmissionPipeline {
    config: Arc<FormConfiguration>,
    schema: FormSchema,
    services: Services,
    hooks: Vec<(HookPoint, Arc<dyn SubmitHook>)>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
    previews: PreviewTracker,
    in_flight: AtomicBool,
    stage: Mutex<Stage>,
}

impl SubmissionPipeline {
    /// Start building a pipeline for `config`
    pub fn builder(config: impl Into<Arc<FormConfiguration>>, services: Services) -> SubmissionPipelineBuilder {
        SubmissionPipelineBuilder {
            config: config.into(),
            services,
            hooks: Vec::new(),
            clock: Arc::new(SystemClock),
            settings: PipelineSettings::default(),
            previews: Arc::new(ObjectUrlPreviews::new()),
        }
    }

    /// Form configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FormConfiguration {
        &self.config
    }

    /// Compiled schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Whether a submission is running
    #[inline]
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Stage of the running submission, `Idle` otherwise
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        *self.stage.lock()
    }

    /// Replace the file selection of an image-set field
    ///
    /// Returns one preview handle per file. The handles of the previous
    /// selection for this field are released.
    ///
    /// # Errors
    /// The field is unknown or does not hold files.
    pub fn select_files(
        &self,
        field: &str,
        files: Vec<FileHandle>,
    ) -> Result<Vec<PreviewHandle>, SelectionError> {
        let descriptor = self
            .config
            .field(field)
            .ok_or_else(|| SelectionError::UnknownField(field.to_owned()))?;
        if !descriptor.is_image_set() {
            return Err(SelectionError::NotAnImageSet(field.to_owned()));
        }

        tracing::debug!(field, count = files.len(), "Files selected");
        Ok(self.previews.select(field, files))
    }

    /// Preview handles of a field's current selection
    #[must_use]
    pub fn previews(&self, field: &str) -> Vec<PreviewHandle> {
        self.previews.previews(field)
    }

    /// Files currently selected for a field
    #[must_use]
    pub fn selected_files(&self, field: &str) -> Option<Vec<FileHandle>> {
        self.previews.files(field)
    }

    /// Release every preview handle and clear every selection
    pub fn release_all(&self) {
        self.previews.release_all();
    }

    /// View model of the form
    #[must_use]
    pub fn render(&self, errors: Option<&ValidationErrors>) -> FormView {
        render::render(
            &self.config,
            errors,
            |name| self.previews.previews(name),
            self.is_submitting(),
        )
    }

    /// Submit `input`
    ///
    /// Image-set fields absent from `input` take the current selection.
    ///
    /// # Errors
    /// See [`SubmissionError`]. A failed validation is not an error.
    pub async fn submit(&self, input: FormInput) -> Result<SubmissionOutcome, SubmissionError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &self.stage) else {
            tracing::warn!("Submission rejected: another submission is in flight");
            return Err(SubmissionError::InFlight);
        };

        let id = SubmissionId::new();
        let span = tracing::info_span!("submission", %id);
        self.run(id, input).instrument(span).await
    }

    async fn run(&self, id: SubmissionId, input: FormInput) -> Result<SubmissionOutcome, SubmissionError> {
        tracing::info!("Submitting form with {} field(s)", self.config.fields().len());

        self.enter(Stage::Validating);
        let selections = self.previews.snapshot();
        let input = self.with_selections(input, &selections);
        let record = match self.schema.validate(&input) {
            Ok(record) => record,
            Err(errors) => {
                tracing::debug!(fields = ?errors.field_names().collect::<Vec<_>>(), "Validation failed");
                return Ok(SubmissionOutcome::Invalid(errors));
            }
        };

        match self.process(id, &record).await {
            Ok(receipt) => {
                tracing::info!(uploads = receipt.uploads.len(), "Submission persisted");
                self.services.notifier.notify_success(&self.settings.success_message);
                self.previews.release_unchanged(&selections);

                if let Err(e) = self.run_hooks(HookPoint::AfterSubmit, &record, Some(&receipt)).await {
                    tracing::warn!("After-submit hook ignored: {}", e);
                }

                Ok(SubmissionOutcome::Submitted(receipt))
            }
            Err(e) => {
                tracing::error!(stage = %e.stage(), "Submission failed: {}", e);
                self.services.notifier.notify_error(self.failure_message(&e));
                Err(e)
            }
        }
    }

    async fn process(&self, id: SubmissionId, record: &ValidatedRecord) -> Result<SubmissionReceipt, SubmissionError> {
        self.run_hooks(HookPoint::BeforeSubmit, record, None).await?;
        self.run_hooks(HookPoint::OnSubmit, record, None).await?;

        let has_attachments = record
            .iter()
            .any(|(name, value)| self.is_image_set(name) && !value.is_empty());
        if (has_attachments || self.config.persistence_path().is_some()) && self.settings.require_authentication {
            self.enter(Stage::Authenticating);
            let user = self
                .services
                .session
                .current_user()
                .await
                .ok_or(SubmissionError::Unauthenticated)?;
            tracing::debug!(%user, "Session verified");
        }

        let timestamp_ms = self.clock.now_millis();
        let mut uploads = Vec::new();
        match self.store(record, timestamp_ms, &mut uploads).await {
            Ok(payload) => Ok(SubmissionReceipt {
                id,
                timestamp_ms,
                path: self.config.persistence_path().cloned(),
                uploads,
                payload,
            }),
            Err(e) => {
                if self.settings.cleanup_on_failure {
                    self.cleanup(&uploads).await;
                }
                Err(e)
            }
        }
    }

    /// Upload, sanitize and persist
    async fn store(
        &self,
        record: &ValidatedRecord,
        timestamp_ms: i64,
        uploads: &mut Vec<UploadedAttachment>,
    ) -> Result<Map<String, Value>, SubmissionError> {
        self.enter(Stage::Uploading);
        let plan = self.plan_destinations(record, timestamp_ms);
        let mut payload = Map::new();

        for (name, value) in record.iter() {
            let entry = match value {
                FieldValue::Null => Value::Null,
                FieldValue::Text(text) => Value::String(text.clone()),
                FieldValue::Files(files) if self.is_image_set(name) => {
                    let destinations = plan.get(name).map_or(&[][..], Vec::as_slice);
                    let urls = self.upload_field(name, files, destinations, uploads).await?;
                    Value::Array(urls.into_iter().map(Value::String).collect())
                }
                FieldValue::Files(_) => {
                    tracing::warn!(field = name, "Dropping files submitted for a non image-set field");
                    continue;
                }
            };
            payload.insert(name.to_owned(), entry);
        }

        self.enter(Stage::Sanitizing);
        let removed = sanitize(&mut payload);
        if !removed.is_empty() {
            tracing::debug!(?removed, "Dropped empty values");
        }

        self.enter(Stage::Persisting);
        match self.config.persistence_path() {
            Some(path) => {
                let mut document: Document = payload
                    .iter()
                    .map(|(k, v)| (k.clone(), DocumentValue::Value(v.clone())))
                    .collect();
                document.insert(self.config.timestamp_field().to_owned(), DocumentValue::ServerTimestamp);

                self.services
                    .documents
                    .merge_write(path, document)
                    .await
                    .map_err(|source| SubmissionError::Persistence {
                        path: path.clone(),
                        source,
                    })?;
                tracing::debug!(%path, "Record merged");
            }
            None => tracing::debug!("No persistence path configured, skipping write"),
        }

        Ok(payload)
    }

    /// Destinations of every attachment in the record, keyed by field
    ///
    /// A name repeated within one submission gets a `-<n>` suffix, numbered
    /// in upload order, so no upload overwrites another.
    fn plan_destinations<'r>(&self, record: &'r ValidatedRecord, timestamp_ms: i64) -> HashMap<&'r str, Vec<String>> {
        let prefix = self.config.blob_storage_path().unwrap_or_default();
        let mut taken = HashSet::new();
        let mut plan = HashMap::new();

        for (name, value) in record.iter() {
            let FieldValue::Files(files) = value else { continue };
            if !self.is_image_set(name) {
                continue;
            }

            let destinations = files
                .iter()
                .map(|file| {
                    let base = format!("{prefix}/{}-{timestamp_ms}", file.name());
                    let mut destination = base.clone();
                    let mut n = 1;
                    while !taken.insert(destination.clone()) {
                        destination = format!("{base}-{n}");
                        n += 1;
                    }
                    destination
                })
                .collect();
            plan.insert(name, destinations);
        }

        plan
    }

    async fn upload_field(
        &self,
        field: &str,
        files: &[FileHandle],
        destinations: &[String],
        uploads: &mut Vec<UploadedAttachment>,
    ) -> Result<Vec<String>, SubmissionError> {
        let mut urls = Vec::with_capacity(files.len());

        for (index, (file, destination)) in files.iter().zip(destinations).enumerate() {
            let upload_error = |source: StorageError| {
                tracing::error!(field, index, file = file.name(), "Upload failed: {}", source);
                SubmissionError::Upload {
                    field: field.to_owned(),
                    index,
                    file_name: file.name().to_owned(),
                    source,
                }
            };

            let blob = self
                .services
                .blobs
                .upload(file.bytes().clone(), destination)
                .await
                .map_err(upload_error)?;

            // Tracked before the URL lookup so cleanup covers it
            uploads.push(UploadedAttachment {
                field: field.to_owned(),
                index,
                file_name: file.name().to_owned(),
                path: blob.path().to_owned(),
                url: String::new(),
            });

            let url = self
                .services
                .blobs
                .retrievable_url(&blob)
                .await
                .map_err(upload_error)?;
            tracing::debug!(field, index, path = blob.path(), "Attachment uploaded");

            if let Some(last) = uploads.last_mut() {
                last.url.clone_from(&url);
            }
            urls.push(url);
        }

        Ok(urls)
    }

    /// Best-effort removal of blobs uploaded by a failed submission
    async fn cleanup(&self, uploads: &[UploadedAttachment]) {
        for upload in uploads {
            match self.services.blobs.delete(&upload.path).await {
                Ok(()) => tracing::debug!(path = %upload.path, "Removed orphaned attachment"),
                Err(e) => tracing::warn!(path = %upload.path, "Could not remove orphaned attachment: {}", e),
            }
        }
    }

    async fn run_hooks(
        &self,
        point: HookPoint,
        record: &ValidatedRecord,
        receipt: Option<&SubmissionReceipt>,
    ) -> Result<(), SubmissionError> {
        let stage = Stage::from(point);
        self.enter(stage);

        let ctx = HookContext { point, record, receipt };
        for (_, hook) in self.hooks.iter().filter(|(p, _)| *p == point) {
            if let HookOutcome::Abort(reason) = hook.run(&ctx).await {
                tracing::warn!(%stage, %reason, "Hook aborted submission");
                return Err(SubmissionError::Aborted { stage, reason });
            }
        }

        Ok(())
    }

    fn failure_message<'a>(&'a self, error: &'a SubmissionError) -> &'a str {
        match error {
            SubmissionError::Aborted { reason, .. } => reason.as_str(),
            SubmissionError::Unauthenticated => self.settings.unauthenticated_message.as_str(),
            _ => self.settings.failure_message.as_str(),
        }
    }

    fn with_selections(&self, mut input: FormInput, selections: &Selections) -> FormInput {
        for field in self.config.image_set_fields() {
            if !input.contains(field.name()) {
                if let Some(selection) = selections.get(field.name()) {
                    input.insert(field.name(), selection.files.clone());
                }
            }
        }
        input
    }

    fn is_image_set(&self, name: &str) -> bool {
        self.config.field(name).is_some_and(FieldDescriptor::is_image_set)
    }

    fn enter(&self, stage: Stage) {
        tracing::debug!(%stage, "Entering stage");
        *self.stage.lock() = stage;
    }
}

impl fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("fields", &self.config.fields().len())
            .field("hooks", &self.hooks.len())
            .field("stage", &self.current_stage())
            .field("submitting", &self.is_submitting())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBlobStorage, InMemoryDocumentStore, StaticSession};
    use crate::hooks::FnHook;
    use crate::services::{BlobRef, MockBlobStorage, Notifier, UserId};
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000_000;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            NOW
        }
    }

    #[derive(Default)]
    struct Notes {
        errors: Mutex<Vec<String>>,
        successes: Mutex<Vec<String>>,
    }

    impl Notifier for Notes {
        fn notify_error(&self, message: &str) {
            self.errors.lock().push(message.to_owned());
        }

        fn notify_success(&self, message: &str) {
            self.successes.lock().push(message.to_owned());
        }
    }

    fn config() -> FormConfiguration {
        FormConfiguration::builder()
            .field(FieldDescriptor::text("title", "Title").required().min_length(3).max_length(20))
            .field(
                FieldDescriptor::image_set("photos", "Photos")
                    .max_count(3)
                    .max_size_mb(2.0)
                    .accept(["image/jpeg", "image/png"]),
            )
            .persist_to("forms", "contact")
            .blob_storage_path("uploads")
            .build()
            .unwrap()
    }

    fn jpeg(name: &str) -> FileHandle {
        FileHandle::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF])
    }

    struct Fixture {
        documents: Arc<InMemoryDocumentStore>,
        notes: Arc<Notes>,
        services: Services,
    }

    fn fixture(blobs: Arc<dyn crate::services::BlobStorage>) -> Fixture {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let notes = Arc::new(Notes::default());
        let services = Services::new(
            Arc::new(StaticSession::signed_in(UserId("ada".into()))),
            blobs,
            documents.clone(),
            notes.clone(),
        );
        Fixture {
            documents,
            notes,
            services,
        }
    }

    #[test]
    fn build_requires_blob_path_for_image_fields() {
        let config = FormConfiguration::builder()
            .field(FieldDescriptor::image_set("photos", "Photos"))
            .build()
            .unwrap();
        let f = fixture(Arc::new(InMemoryBlobStorage::new()));

        let err = SubmissionPipeline::builder(config, f.services).build().unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingBlobStoragePath { field } if field == "photos"));
    }

    #[tokio::test]
    async fn upload_failure_names_index_and_rolls_back() {
        let mut blobs = MockBlobStorage::new();
        blobs
            .expect_upload()
            .withf(|_, path: &str| path == format!("uploads/a.jpg-{NOW}"))
            .times(1)
            .returning(|_, path| Ok(BlobRef::new(path)));
        blobs
            .expect_upload()
            .withf(|_, path: &str| path.starts_with("uploads/b.jpg-"))
            .times(1)
            .returning(|_, _| Err(StorageError::Backend("quota exceeded".into())));
        blobs
            .expect_retrievable_url()
            .times(1)
            .returning(|blob| Ok(format!("memory://{}", blob.path())));
        blobs
            .expect_delete()
            .withf(|path: &str| path == format!("uploads/a.jpg-{NOW}"))
            .times(1)
            .returning(|_| Ok(()));

        let f = fixture(Arc::new(blobs));
        let pipeline = SubmissionPipeline::builder(config(), f.services)
            .clock(Arc::new(FixedClock))
            .build()
            .unwrap();

        let input = FormInput::new()
            .with("title", "Hello World")
            .with("photos", vec![jpeg("a.jpg"), jpeg("b.jpg")]);
        let err = pipeline.submit(input).await.unwrap_err();

        match err {
            SubmissionError::Upload { field, index, file_name, .. } => {
                assert_eq!((field.as_str(), index, file_name.as_str()), ("photos", 1, "b.jpg"));
            }
            other => panic!("expected upload error, got {other:?}"),
        }
        assert_eq!(*f.notes.errors.lock(), [DEFAULT_FAILURE_MESSAGE]);
        assert!(f.notes.successes.lock().is_empty());
        assert_eq!(f.documents.write_count(), 0);
        assert!(!pipeline.is_submitting());
        assert_eq!(pipeline.current_stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn cleanup_can_be_disabled() {
        let mut blobs = MockBlobStorage::new();
        blobs.expect_upload().returning(|_, path| Ok(BlobRef::new(path)));
        blobs
            .expect_retrievable_url()
            .returning(|_| Err(StorageError::NotFound("gone".into())));
        blobs.expect_delete().never();

        let f = fixture(Arc::new(blobs));
        let pipeline = SubmissionPipeline::builder(config(), f.services)
            .settings(PipelineSettings::default().with_cleanup_on_failure(false))
            .build()
            .unwrap();

        let input = FormInput::new().with("title", "Hello").with("photos", vec![jpeg("a.jpg")]);
        let err = pipeline.submit(input).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Upload { index: 0, .. }));
    }

    #[tokio::test]
    async fn validation_failure_has_no_side_effects() {
        let mut blobs = MockBlobStorage::new();
        blobs.expect_upload().never();

        let f = fixture(Arc::new(blobs));
        let pipeline = SubmissionPipeline::builder(config(), f.services)
            .hook(
                HookPoint::BeforeSubmit,
                FnHook::new("never", |_: &HookContext<'_>| HookOutcome::abort("should not run")),
            )
            .build()
            .unwrap();

        let outcome = pipeline
            .submit(FormInput::new().with("title", "Hi").with("photos", Vec::<FileHandle>::new()))
            .await
            .unwrap();

        let errors = outcome.errors().unwrap();
        assert_eq!(errors.field_names().collect::<Vec<_>>(), ["title"]);
        assert_eq!(errors.message("title"), Some("Title must be at least 3 characters"));
        assert!(f.notes.errors.lock().is_empty());
        assert_eq!(f.documents.write_count(), 0);
    }

    #[tokio::test]
    async fn selection_fills_missing_image_field() {
        let blobs = Arc::new(InMemoryBlobStorage::new());
        let f = fixture(blobs.clone());
        let pipeline = SubmissionPipeline::builder(config(), f.services)
            .clock(Arc::new(FixedClock))
            .build()
            .unwrap();

        let previews = pipeline.select_files("photos", vec![jpeg("cat.jpg")]).unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(pipeline.render(None).control("photos").map(|c| c.name.as_str()), Some("photos"));

        let outcome = pipeline.submit(FormInput::new().with("title", "Hello")).await.unwrap();
        let receipt = outcome.receipt().unwrap();

        assert_eq!(receipt.uploads.len(), 1);
        assert_eq!(receipt.uploads[0].path, format!("uploads/cat.jpg-{NOW}"));
        assert!(blobs.contains(&receipt.uploads[0].path));
        assert!(pipeline.selected_files("photos").is_none());
        assert!(pipeline.previews("photos").is_empty());
    }

    #[test]
    fn selecting_files_on_text_field_fails() {
        let f = fixture(Arc::new(InMemoryBlobStorage::new()));
        let pipeline = SubmissionPipeline::builder(config(), f.services).build().unwrap();

        assert!(matches!(
            pipeline.select_files("title", vec![jpeg("a.jpg")]),
            Err(SelectionError::NotAnImageSet(_))
        ));
        assert!(matches!(
            pipeline.select_files("nope", vec![]),
            Err(SelectionError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn anonymous_session_is_rejected_before_upload() {
        let mut blobs = MockBlobStorage::new();
        blobs.expect_upload().never();

        let notes = Arc::new(Notes::default());
        let services = Services::new(
            Arc::new(StaticSession::anonymous()),
            Arc::new(blobs),
            Arc::new(InMemoryDocumentStore::new()),
            notes.clone(),
        );
        let pipeline = SubmissionPipeline::builder(config(), services).build().unwrap();

        let err = pipeline.submit(FormInput::new().with("title", "Hello")).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Unauthenticated));
        assert_eq!(*notes.errors.lock(), [DEFAULT_UNAUTHENTICATED_MESSAGE]);
    }
}
