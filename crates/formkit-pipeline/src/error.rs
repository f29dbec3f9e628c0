//! Error types for the submission pipeline
//!
//! Provides error handling for:
//! - External service failures (blob storage, document store)
//! - Submission failures after validation passed
//! - File selection on fields that cannot hold files
//!
//! Validation failures are not errors here: they are a normal
//! [`SubmissionOutcome`](crate::SubmissionOutcome).

use formkit_schema::PersistencePath;
use std::fmt;
use std::path::PathBuf;

/// Failures reported by storage services
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Object or document does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Path escapes the storage root or is otherwise unusable
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    /// Caller lacks access
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// IO error in a local backend
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored document could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No submission running
    Idle,
    /// Checking the record against the schema
    Validating,
    /// Running before-submit hooks
    BeforeSubmit,
    /// Running on-submit hooks
    OnSubmit,
    /// Checking the session
    Authenticating,
    /// Transferring attachments
    Uploading,
    /// Dropping empty values
    Sanitizing,
    /// Merge-writing the record
    Persisting,
    /// Running after-submit hooks
    AfterSubmit,
}

impl Stage {
    /// Stable lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::BeforeSubmit => "before_submit",
            Self::OnSubmit => "on_submit",
            Self::Authenticating => "authenticating",
            Self::Uploading => "uploading",
            Self::Sanitizing => "sanitizing",
            Self::Persisting => "persisting",
            Self::AfterSubmit => "after_submit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a submission after it was accepted for processing
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// Another submission of the same form is still running
    #[error("a submission is already in flight")]
    InFlight,

    /// Upload or persistence needs a signed-in user
    #[error("no authenticated user")]
    Unauthenticated,

    /// A lifecycle hook vetoed the submission
    #[error("{stage} hook aborted the submission: {reason}")]
    Aborted { stage: Stage, reason: String },

    /// Transferring an attachment failed
    #[error("upload of '{file_name}' ({field}[{index}]) failed: {source}")]
    Upload {
        field: String,
        index: usize,
        file_name: String,
        #[source]
        source: StorageError,
    },

    /// Writing the record failed
    #[error("persisting to {path} failed: {source}")]
    Persistence {
        path: PersistencePath,
        #[source]
        source: StorageError,
    },
}

impl SubmissionError {
    /// Stage the submission stopped at
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::InFlight => Stage::Idle,
            Self::Unauthenticated => Stage::Authenticating,
            Self::Aborted { stage, .. } => *stage,
            Self::Upload { .. } => Stage::Uploading,
            Self::Persistence { .. } => Stage::Persisting,
        }
    }

    /// Whether resubmitting the same input may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InFlight | Self::Upload { .. } | Self::Persistence { .. }
        )
    }
}

/// Errors from the file selection lifecycle
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// No such field in the configuration
    #[error("unknown field: '{0}'")]
    UnknownField(String),

    /// Field exists but does not hold files
    #[error("field '{0}' is not an image set")]
    NotAnImageSet(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_name_the_attachment() {
        let err = SubmissionError::Upload {
            field: "photos".into(),
            index: 2,
            file_name: "c.png".into(),
            source: StorageError::Backend("quota exceeded".into()),
        };
        assert_eq!(
            err.to_string(),
            "upload of 'c.png' (photos[2]) failed: backend error: quota exceeded"
        );
        assert_eq!(err.stage(), Stage::Uploading);
        assert!(err.is_retryable());
    }

    #[test]
    fn vetoes_are_not_retryable() {
        let err = SubmissionError::Aborted {
            stage: Stage::BeforeSubmit,
            reason: "closed".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.stage(), Stage::BeforeSubmit);
        assert!(!SubmissionError::Unauthenticated.is_retryable());
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Validating < Stage::Uploading);
        assert!(Stage::Sanitizing < Stage::Persisting);
        assert_eq!(Stage::AfterSubmit.to_string(), "after_submit");
    }
}
