//! Error types for form configuration
//!
//! Configuration errors are programmer-time defects: they are raised while a
//! [`FormConfiguration`](crate::FormConfiguration) is being constructed or
//! loaded, never while a record is being validated.

use std::path::PathBuf;

/// Errors raised while building or loading a form configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A field was declared without a name
    #[error("field at position {position} has an empty name")]
    EmptyFieldName { position: usize },

    /// Two fields share a name; the later one would shadow the earlier
    #[error("duplicate field name '{name}' at positions {first} and {second}")]
    DuplicateFieldName {
        name: String,
        first: usize,
        second: usize,
    },

    /// Text length bounds are inverted
    #[error("field '{field}': min_length {min} exceeds max_length {max}")]
    InvalidLengthBounds {
        field: String,
        min: usize,
        max: usize,
    },

    /// Image-set count bound below one
    #[error("field '{field}': max_count must be at least 1")]
    InvalidMaxCount { field: String },

    /// Image-set size bound not a positive number
    #[error("field '{field}': max_size_mb must be a positive number, got {value}")]
    InvalidMaxSize { field: String, value: f64 },

    /// Required select field without any option to choose
    #[error("field '{field}': a required select needs at least one option")]
    EmptyOptions { field: String },

    /// Select option values must be unique
    #[error("field '{field}': duplicate option value '{value}'")]
    DuplicateOption { field: String, value: String },

    /// Persistence path has an empty collection or document id
    #[error("invalid persistence path: {reason}")]
    InvalidPersistencePath { reason: String },

    /// Blob storage path given but empty
    #[error("blob storage path must not be empty")]
    EmptyBlobStoragePath,

    /// Timestamp field name collides with a form field or is empty
    #[error("invalid timestamp field '{name}': {reason}")]
    InvalidTimestampField { name: String, reason: String },

    /// Form collects files but has nowhere to put them
    #[error("field '{field}' collects files but no blob storage path is configured")]
    MissingBlobStoragePath { field: String },

    /// Top-level key not part of a configuration document
    #[error("unknown configuration key '{key}'")]
    UnknownKey { key: String },

    /// Field key misspelled or belonging to another kind
    #[error("field '{field}': '{key}' does not apply to {kind} fields")]
    UnsupportedKey {
        field: String,
        key: String,
        kind: String,
    },

    /// Configuration file extension not understood
    #[error("unsupported configuration format: '{0}'")]
    UnsupportedFormat(String),

    /// Configuration document could not be parsed
    #[error("syntax error in {origin}: {message}")]
    Syntax { origin: String, message: String },

    /// IO error while reading a configuration file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigurationError {
    /// Create syntax error for a named source
    pub fn syntax(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Syntax {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Name of the offending field, when the error is about one
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::DuplicateFieldName { name: field, .. }
            | Self::InvalidLengthBounds { field, .. }
            | Self::InvalidMaxCount { field }
            | Self::InvalidMaxSize { field, .. }
            | Self::EmptyOptions { field }
            | Self::DuplicateOption { field, .. }
            | Self::UnsupportedKey { field, .. }
            | Self::MissingBlobStoragePath { field } => Some(field),
            _ => None,
        }
    }
}
