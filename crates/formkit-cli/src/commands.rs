//! Command implementations
//!
//! Each command returns a [`Report`]: a JSON body to print and whether the
//! command succeeded. Hard failures (unreadable files, bad configuration,
//! storage errors) are `Err`.

use crate::input::load_input;
use anyhow::{Context, Result};
use formkit_pipeline::backend::{
    InMemoryBlobStorage, InMemoryDocumentStore, JsonDocumentStore, LocalBlobStorage, LogNotifier,
    StaticSession,
};
use formkit_pipeline::{PipelineSettings, Services, SubmissionOutcome, SubmissionPipeline, UserId};
use formkit_schema::FormConfiguration;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

/// Subdirectory of the data directory holding attachments
pub const BLOB_DIR: &str = "blobs";

/// Subdirectory of the data directory holding documents
pub const DOCUMENT_DIR: &str = "documents";

/// Output of a command
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Whether the command reached its goal
    pub ok: bool,
    /// Printed as pretty JSON
    pub body: Value,
}

impl Report {
    fn ok(body: Value) -> Self {
        Self { ok: true, body }
    }

    fn rejected(body: Value) -> Self {
        Self { ok: false, body }
    }
}

fn load_config(path: &Path) -> Result<FormConfiguration> {
    FormConfiguration::from_path(path).with_context(|| format!("loading form configuration {}", path.display()))
}

/// Services that never leave the process
fn offline_services() -> Services {
    Services::new(
        Arc::new(StaticSession::anonymous()),
        Arc::new(InMemoryBlobStorage::new()),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(LogNotifier),
    )
}

fn offline_pipeline(config: FormConfiguration) -> Result<SubmissionPipeline> {
    SubmissionPipeline::builder(config, offline_services())
        .build()
        .context("form configuration cannot be submitted")
}

/// `formkit check <config>`
pub fn check(config_path: &Path) -> Result<Report> {
    let config = load_config(config_path)?;

    let fields: Vec<Value> = config
        .fields()
        .iter()
        .map(|f| json!({"name": f.name(), "kind": f.kind().tag(), "required": f.is_required()}))
        .collect();
    let body = json!({
        "fields": fields,
        "persistence_path": config.persistence_path().map(ToString::to_string),
        "blob_storage_path": config.blob_storage_path(),
        "timestamp_field": config.timestamp_field(),
    });

    offline_pipeline(config)?;
    tracing::info!(path = %config_path.display(), "Configuration is valid");
    Ok(Report::ok(body))
}

/// `formkit validate <config> <input>`
pub fn validate(config_path: &Path, input_path: &Path) -> Result<Report> {
    let config = load_config(config_path)?;
    let input = load_input(input_path)?;

    Ok(match config.schema().validate(&input) {
        Ok(record) => Report::ok(json!({"valid": true, "fields": record.len()})),
        Err(errors) => Report::rejected(json!({"valid": false, "errors": errors})),
    })
}

/// `formkit render <config>`
pub fn render(config_path: &Path) -> Result<Report> {
    let pipeline = offline_pipeline(load_config(config_path)?)?;
    let view = pipeline.render(None);
    Ok(Report::ok(serde_json::to_value(view)?))
}

/// Options of `formkit submit`
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Signed-in user
    pub user: Option<String>,
    /// Skip the session check
    pub anonymous: bool,
}

/// `formkit submit <config> <input> --data-dir <dir>`
///
/// Attachments go to `<dir>/blobs`, documents to `<dir>/documents`.
pub async fn submit(config_path: &Path, input_path: &Path, data_dir: &Path, options: SubmitOptions) -> Result<Report> {
    let config = load_config(config_path)?;
    let input = load_input(input_path)?;

    let session = match options.user {
        Some(user) => StaticSession::signed_in(UserId(user)),
        None => StaticSession::anonymous(),
    };
    let services = Services::new(
        Arc::new(session),
        Arc::new(LocalBlobStorage::new(data_dir.join(BLOB_DIR))),
        Arc::new(JsonDocumentStore::new(data_dir.join(DOCUMENT_DIR))),
        Arc::new(LogNotifier),
    );
    let pipeline = SubmissionPipeline::builder(config, services)
        .settings(PipelineSettings::default().with_require_authentication(!options.anonymous))
        .build()
        .context("form configuration cannot be submitted")?;

    match pipeline.submit(input).await.context("submission failed")? {
        SubmissionOutcome::Submitted(receipt) => Ok(Report::ok(json!({"submitted": true, "receipt": receipt}))),
        SubmissionOutcome::Invalid(errors) => Ok(Report::rejected(json!({"submitted": false, "errors": errors}))),
    }
}
