//! Submission input files
//!
//! An input file is a JSON object keyed by field name:
//!
//! ```json
//! { "title": "Hello", "description": null, "photos": ["cat.jpg"] }
//! ```
//!
//! Strings become text, `null` stays null and arrays of strings are read as
//! files, relative to the directory of the input file.

use anyhow::{bail, Context, Result};
use formkit_schema::{FieldValue, FileHandle, FormInput};
use serde_json::Value;
use std::path::Path;

/// MIME type guessed from a file extension
#[must_use]
pub fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Read a file from disk into a handle
pub fn read_file(path: &Path) -> Result<FileHandle> {
    let bytes = std::fs::read(path).with_context(|| format!("reading attachment {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("attachment path has no file name: {}", path.display()))?;
    Ok(FileHandle::new(name, mime_for(path), bytes))
}

/// Convert a parsed input document, resolving file paths against `base`
pub fn input_from_json(document: Value, base: &Path) -> Result<FormInput> {
    let Value::Object(entries) = document else {
        bail!("input must be a JSON object keyed by field name");
    };

    let mut input = FormInput::new();
    for (name, value) in entries {
        let value = match value {
            Value::Null => FieldValue::Null,
            Value::String(text) => FieldValue::Text(text),
            Value::Array(items) => {
                let files = items
                    .iter()
                    .map(|item| match item {
                        Value::String(path) => read_file(&base.join(path)),
                        other => bail!("field '{name}': expected a file path, got {other}"),
                    })
                    .collect::<Result<Vec<_>>>()?;
                FieldValue::Files(files)
            }
            other => bail!("field '{name}': unsupported value {other}"),
        };
        input.insert(name, value);
    }

    Ok(input)
}

/// Load an input file
pub fn load_input(path: &Path) -> Result<FormInput> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading input {}", path.display()))?;
    let document: Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing input {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    input_from_json(document, base)
}
