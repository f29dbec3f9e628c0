//! Per-field validation failures
//!
//! Validation never panics and never returns a configuration error: a record
//! that does not satisfy the schema yields [`ValidationErrors`], a map from
//! field name to the violations found for that field, in rule order.

use indexmap::IndexMap;
use serde::Serialize;

/// Class of rule that was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Value missing or empty
    Required,
    /// Text shorter than the minimum length
    TooShort,
    /// Text longer than the maximum length
    TooLong,
    /// More files than allowed
    TooManyFiles,
    /// A file exceeds the size bound
    FileTooLarge,
    /// A file has a MIME type outside the accepted set
    UnsupportedType,
    /// Select value outside the option domain
    NotAnOption,
    /// Value of the wrong shape for the field kind
    InvalidType,
    /// Rejected by a custom rule
    Custom,
}

/// One violated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Rule class
    pub kind: ViolationKind,
    /// Label-specific message for display
    pub message: String,
}

impl Violation {
    /// Create a violation
    #[must_use]
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Violations of a whole record, keyed by field name in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} field(s) failed validation", .fields.len())]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: IndexMap<String, Vec<Violation>>,
}

impl ValidationErrors {
    /// Create an empty error set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the violations of one field; empty lists are ignored
    pub fn insert(&mut self, field: impl Into<String>, violations: Vec<Violation>) {
        if violations.is_empty() {
            return;
        }
        self.fields.entry(field.into()).or_default().extend(violations);
    }

    /// No field failed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of failing fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// All violations of a field, in rule order
    #[must_use]
    pub fn get(&self, field: &str) -> &[Violation] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// First violation of a field; the same input always yields the same one
    #[must_use]
    pub fn first(&self, field: &str) -> Option<&Violation> {
        self.get(field).first()
    }

    /// First message of a field, for inline display
    #[must_use]
    pub fn message(&self, field: &str) -> Option<&str> {
        self.first(field).map(|v| v.message.as_str())
    }

    /// Whether a field has a violation of the given kind
    #[must_use]
    pub fn has(&self, field: &str, kind: ViolationKind) -> bool {
        self.get(field).iter().any(|v| v.kind == kind)
    }

    /// Failing field names, in configuration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over failing fields and their violations
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Violation])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Map of field name to first message
    #[must_use]
    pub fn first_messages(&self) -> IndexMap<&str, &str> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.first().map(|first| (k.as_str(), first.message.as_str())))
            .collect()
    }
}
