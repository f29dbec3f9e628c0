//! Field descriptors
//!
//! A [`FieldDescriptor`] declares one input of a form: its name, label,
//! whether it is required, and a kind-specific set of constraints. The set of
//! kinds is closed; the schema builder matches on [`FieldKind`] exhaustively.

use crate::value::FieldValue;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

type RuleFn = dyn Fn(&FieldValue) -> Result<(), String> + Send + Sync;

/// Externally supplied validation rule
///
/// When attached to a field it replaces every generated rule for that field.
/// The closure receives [`FieldValue::Null`] when no value was submitted and
/// returns the message to surface on failure.
#[derive(Clone)]
pub struct CustomRule {
    name: Arc<str>,
    check: Arc<RuleFn>,
}

impl CustomRule {
    /// Wrap a closure as a named rule
    pub fn new<F>(name: impl Into<Arc<str>>, check: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Rule name, for diagnostics
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the rule against a value
    pub fn check(&self, value: &FieldValue) -> Result<(), String> {
        (self.check)(value)
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomRule").field(&self.name).finish()
    }
}

/// Constraints for single- and multi-line text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextConstraints {
    /// Minimum trimmed length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum trimmed length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Hint shown in an empty control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Constraints for a set of uploaded images
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSetConstraints {
    /// Allowed MIME types; empty means any type
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub accepted_mime_types: IndexSet<String>,
    /// Maximum number of files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
    /// Maximum size of each file, in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<f64>,
}

/// One choice of a select field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectOption {
    /// Submitted value
    pub value: String,
    /// Display text
    pub label: String,
}

impl SelectOption {
    /// Create an option
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Constraints for a single-choice select
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectConstraints {
    /// Choices, in display order
    #[serde(default)]
    pub options: Vec<SelectOption>,
    /// Text of the leading "no selection" entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Kind-specific part of a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldKind {
    /// One-line text input
    SingleLine(TextConstraints),
    /// Multi-line text area
    MultiLine(TextConstraints),
    /// Set of image files
    ImageSet(ImageSetConstraints),
    /// Single choice among fixed options
    Select(SelectConstraints),
}

/// Keys every field accepts, whatever its kind
pub(crate) const COMMON_FIELD_KEYS: &[&str] = &["name", "label", "required", "kind"];

const TEXT_KEYS: &[&str] = &["min_length", "max_length", "placeholder"];
const IMAGE_SET_KEYS: &[&str] = &["accepted_mime_types", "max_count", "max_size_mb"];
const SELECT_KEYS: &[&str] = &["options", "placeholder"];

impl FieldKind {
    /// Constraint keys a kind tag accepts; `None` for an unknown tag
    pub(crate) fn constraint_keys(tag: &str) -> Option<&'static [&'static str]> {
        match tag {
            "single-line" | "multi-line" => Some(TEXT_KEYS),
            "image-set" => Some(IMAGE_SET_KEYS),
            "select" => Some(SELECT_KEYS),
            _ => None,
        }
    }

    /// Tag used in configuration files
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SingleLine(_) => "single-line",
            Self::MultiLine(_) => "multi-line",
            Self::ImageSet(_) => "image-set",
            Self::Select(_) => "select",
        }
    }
}

/// Declarative description of one form input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    name: String,
    label: String,
    #[serde(default)]
    required: bool,
    #[serde(skip)]
    custom_validator: Option<CustomRule>,
    #[serde(flatten)]
    kind: FieldKind,
}

impl FieldDescriptor {
    fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            required: false,
            custom_validator: None,
            kind,
        }
    }

    /// Single-line text field
    #[must_use]
    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::SingleLine(TextConstraints::default()))
    }

    /// Multi-line text field
    #[must_use]
    pub fn multi_line(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::MultiLine(TextConstraints::default()))
    }

    /// Image-set field
    #[must_use]
    pub fn image_set(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::ImageSet(ImageSetConstraints::default()))
    }

    /// Select field with the given options
    #[must_use]
    pub fn select(
        name: impl Into<String>,
        label: impl Into<String>,
        options: impl IntoIterator<Item = SelectOption>,
    ) -> Self {
        Self::new(
            name,
            label,
            FieldKind::Select(SelectConstraints {
                options: options.into_iter().collect(),
                placeholder: None,
            }),
        )
    }

    /// Mark as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Replace generated rules with a custom one
    #[inline]
    #[must_use]
    pub fn with_validator(mut self, rule: CustomRule) -> Self {
        self.custom_validator = Some(rule);
        self
    }

    fn ignored(&self, constraint: &str) {
        tracing::warn!(
            field = %self.name,
            kind = self.kind.tag(),
            constraint,
            "Constraint does not apply to this field kind, ignored"
        );
    }

    /// Minimum length (text kinds only)
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        if let FieldKind::SingleLine(c) | FieldKind::MultiLine(c) = &mut self.kind {
            c.min_length = Some(min);
        } else {
            self.ignored("min_length");
        }
        self
    }

    /// Maximum length (text kinds only)
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        if let FieldKind::SingleLine(c) | FieldKind::MultiLine(c) = &mut self.kind {
            c.max_length = Some(max);
        } else {
            self.ignored("max_length");
        }
        self
    }

    /// Placeholder (text and select kinds)
    #[must_use]
    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        match &mut self.kind {
            FieldKind::SingleLine(c) | FieldKind::MultiLine(c) => c.placeholder = Some(text.into()),
            FieldKind::Select(c) => c.placeholder = Some(text.into()),
            FieldKind::ImageSet(_) => self.ignored("placeholder"),
        }
        self
    }

    /// Accepted MIME types (image-set only)
    #[must_use]
    pub fn accept<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let FieldKind::ImageSet(c) = &mut self.kind {
            c.accepted_mime_types = mime_types.into_iter().map(Into::into).collect();
        } else {
            self.ignored("accept");
        }
        self
    }

    /// Maximum number of files (image-set only)
    #[must_use]
    pub fn max_count(mut self, max: usize) -> Self {
        if let FieldKind::ImageSet(c) = &mut self.kind {
            c.max_count = Some(max);
        } else {
            self.ignored("max_count");
        }
        self
    }

    /// Maximum size per file in MB (image-set only)
    #[must_use]
    pub fn max_size_mb(mut self, max: f64) -> Self {
        if let FieldKind::ImageSet(c) = &mut self.kind {
            c.max_size_mb = Some(max);
        } else {
            self.ignored("max_size_mb");
        }
        self
    }

    /// Field name, unique within a form
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether a value must be supplied
    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Custom rule, if any
    #[inline]
    #[must_use]
    pub fn custom_validator(&self) -> Option<&CustomRule> {
        self.custom_validator.as_ref()
    }

    /// Kind and constraints
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether this field collects files
    #[inline]
    #[must_use]
    pub fn is_image_set(&self) -> bool {
        matches!(self.kind, FieldKind::ImageSet(_))
    }

    /// Placeholder text, for kinds that have one
    #[must_use]
    pub fn placeholder_text(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::SingleLine(c) | FieldKind::MultiLine(c) => c.placeholder.as_deref(),
            FieldKind::Select(c) => c.placeholder.as_deref(),
            FieldKind::ImageSet(_) => None,
        }
    }
}
