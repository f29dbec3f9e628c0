//! formkit pipeline
//!
//! Submission of validated form records: lifecycle hooks, sequential
//! attachment upload, payload sanitization and merge-write persistence.
//!
//! # Overview
//!
//! - **SubmissionPipeline**: per-form state machine with an in-flight guard
//! - **Services**: injected session, blob storage, document store and notifier
//! - **Hooks**: typed `BeforeSubmit` / `OnSubmit` / `AfterSubmit` stages
//! - **Previews**: file selections and their temporary preview handles
//! - **Render**: serializable view model of the form
//!
//! # Example
//!
//! ```rust
//! use formkit_pipeline::prelude::*;
//! use formkit_pipeline::backend::{InMemoryBlobStorage, InMemoryDocumentStore, LogNotifier, StaticSession};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let config = FormConfiguration::builder()
//!     .field(FieldDescriptor::text("title", "Title").required().min_length(3))
//!     .persist_to("forms", "contact")
//!     .build()
//!     .unwrap();
//!
//! let services = Services::new(
//!     Arc::new(StaticSession::signed_in(UserId("ada".into()))),
//!     Arc::new(InMemoryBlobStorage::new()),
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(LogNotifier),
//! );
//! let pipeline = SubmissionPipeline::builder(config, services).build().unwrap();
//!
//! let outcome = pipeline.submit(FormInput::new().with("title", "Hello")).await.unwrap();
//! assert!(outcome.is_submitted());
//! # });
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod preview;
pub mod render;
pub mod sanitize;
pub mod services;

// Re-exports
pub use error::{SelectionError, Stage, StorageError, SubmissionError};
pub use hooks::{FnHook, HookContext, HookOutcome, HookPoint, SubmitHook};
pub use pipeline::{
    PipelineSettings, SubmissionId, SubmissionOutcome, SubmissionPipeline, SubmissionPipelineBuilder,
    SubmissionReceipt, UploadedAttachment,
};
pub use preview::{ObjectUrlPreviews, PreviewHandle, PreviewSurface};
pub use render::{Control, ControlView, FormView, SubmitControl};
pub use services::{
    BlobRef, BlobStorage, Clock, Document, DocumentStore, DocumentValue, Notifier, Services,
    SessionProvider, SystemClock, UserId,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosting a form
    pub use crate::{
        HookOutcome, HookPoint, PipelineSettings, Services, SubmissionError, SubmissionOutcome,
        SubmissionPipeline, UserId,
    };
    pub use formkit_schema::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
