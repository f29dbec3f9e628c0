//! Schema builder
//!
//! Translates each [`FieldDescriptor`] into a rule set and combines them into
//! a [`FormSchema`] that validates whole records.
//!
//! Precedence is fixed: a custom validator on a field replaces every generated
//! rule for that field. Otherwise rules are derived from the field kind:
//!
//! | Kind | Rules, in order |
//! |------|-----------------|
//! | text | required (trimmed, non-empty), min length, max length |
//! | image-set | required, max count, max size per file, accepted MIME types |
//! | select | required / member of option values |

use crate::config::FormConfiguration;
use crate::field::{CustomRule, FieldDescriptor, FieldKind, ImageSetConstraints, SelectConstraints, TextConstraints};
use crate::value::{FieldValue, FileHandle, FormInput, ValidatedRecord};
use crate::violation::{ValidationErrors, Violation, ViolationKind};
use indexmap::IndexSet;

/// Compiles configurations into schemas
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Build the composite validator for a configuration
    #[must_use]
    pub fn build(config: &FormConfiguration) -> FormSchema {
        let fields = config
            .fields()
            .iter()
            .map(|field| (field.name().to_owned(), Self::rules_for(field)))
            .collect();

        FormSchema { fields }
    }

    /// Derive the rule set of one field
    #[must_use]
    pub fn rules_for(field: &FieldDescriptor) -> FieldRules {
        if let Some(rule) = field.custom_validator() {
            return FieldRules::Custom(rule.clone());
        }

        let label = field.label().to_owned();
        let required = field.is_required();

        match field.kind() {
            FieldKind::SingleLine(c) | FieldKind::MultiLine(c) => {
                FieldRules::Text(TextRules::new(label, required, c))
            }
            FieldKind::ImageSet(c) => FieldRules::ImageSet(ImageSetRules::new(label, required, c)),
            FieldKind::Select(c) => FieldRules::Select(SelectRules::new(label, required, c)),
        }
    }
}

/// Rule set of one field
#[derive(Debug, Clone)]
pub enum FieldRules {
    /// Externally supplied rule
    Custom(CustomRule),
    /// Generated text rules
    Text(TextRules),
    /// Generated image-set rules
    ImageSet(ImageSetRules),
    /// Generated select rules
    Select(SelectRules),
}

impl FieldRules {
    /// Check a value; `None` means the field was not submitted
    #[must_use]
    pub fn check(&self, value: Option<&FieldValue>) -> Vec<Violation> {
        match self {
            Self::Custom(rule) => {
                let value = value.unwrap_or(&FieldValue::Null);
                match rule.check(value) {
                    Ok(()) => Vec::new(),
                    Err(message) => vec![Violation::new(ViolationKind::Custom, message)],
                }
            }
            Self::Text(rules) => rules.check(value),
            Self::ImageSet(rules) => rules.check(value),
            Self::Select(rules) => rules.check(value),
        }
    }

    /// Value carried into the validated record, if any
    ///
    /// Text is carried trimmed, as it was measured.
    fn normalize(&self, value: Option<&FieldValue>) -> Option<FieldValue> {
        match (self, value) {
            (Self::ImageSet(_), None | Some(FieldValue::Null)) => Some(FieldValue::Files(Vec::new())),
            (Self::Text(_), Some(FieldValue::Text(text))) => Some(FieldValue::Text(text.trim().to_owned())),
            (_, v) => v.cloned(),
        }
    }
}

/// Rules for single- and multi-line text
#[derive(Debug, Clone)]
pub struct TextRules {
    label: String,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl TextRules {
    fn new(label: String, required: bool, c: &TextConstraints) -> Self {
        Self {
            label,
            required,
            min_length: c.min_length,
            max_length: c.max_length,
        }
    }

    fn check(&self, value: Option<&FieldValue>) -> Vec<Violation> {
        let mut out = Vec::new();

        let text = match value {
            None | Some(FieldValue::Null) => {
                if self.required {
                    out.push(self.required_violation());
                }
                return out;
            }
            Some(FieldValue::Text(s)) => s.trim(),
            Some(other) => {
                out.push(invalid_type(&self.label, "text", other));
                return out;
            }
        };

        if text.is_empty() {
            if !self.required {
                return out;
            }
            out.push(self.required_violation());
        }

        let length = text.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                out.push(Violation::new(
                    ViolationKind::TooShort,
                    format!("{} must be at least {min} characters", self.label),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                out.push(Violation::new(
                    ViolationKind::TooLong,
                    format!("{} must be at most {max} characters", self.label),
                ));
            }
        }

        out
    }

    fn required_violation(&self) -> Violation {
        Violation::new(ViolationKind::Required, format!("{} is required", self.label))
    }
}

/// Rules for a set of image files
///
/// The four checks are independent; each reports its own violation.
#[derive(Debug, Clone)]
pub struct ImageSetRules {
    label: String,
    required: bool,
    max_count: Option<usize>,
    max_size_mb: Option<f64>,
    accepted: IndexSet<String>,
}

impl ImageSetRules {
    fn new(label: String, required: bool, c: &ImageSetConstraints) -> Self {
        Self {
            label,
            required,
            max_count: c.max_count,
            max_size_mb: c.max_size_mb,
            accepted: c.accepted_mime_types.clone(),
        }
    }

    fn check(&self, value: Option<&FieldValue>) -> Vec<Violation> {
        let files: &[FileHandle] = match value {
            None | Some(FieldValue::Null) => &[],
            Some(FieldValue::Files(files)) => files,
            Some(other) => return vec![invalid_type(&self.label, "files", other)],
        };

        let mut out = Vec::new();

        if self.required && files.is_empty() {
            out.push(Violation::new(
                ViolationKind::Required,
                format!("{} is required", self.label),
            ));
        }

        if let Some(max) = self.max_count {
            if files.len() > max {
                out.push(Violation::new(
                    ViolationKind::TooManyFiles,
                    format!("{} can have at most {max} file(s)", self.label),
                ));
            }
        }

        if let Some(max_mb) = self.max_size_mb {
            if files.iter().any(|f| f.size_mb() > max_mb) {
                out.push(Violation::new(
                    ViolationKind::FileTooLarge,
                    format!("{} must be ≤ {max_mb}MB per file", self.label),
                ));
            }
        }

        if !self.accepted.is_empty() && files.iter().any(|f| !self.accepted.contains(f.mime_type())) {
            let types: Vec<&str> = self.accepted.iter().map(String::as_str).collect();
            out.push(Violation::new(
                ViolationKind::UnsupportedType,
                format!("{} must be of type: {}", self.label, types.join(", ")),
            ));
        }

        out
    }
}

/// Rules for a single-choice select
#[derive(Debug, Clone)]
pub struct SelectRules {
    label: String,
    required: bool,
    domain: IndexSet<String>,
}

impl SelectRules {
    fn new(label: String, required: bool, c: &SelectConstraints) -> Self {
        Self {
            label,
            required,
            domain: c.options.iter().map(|o| o.value.clone()).collect(),
        }
    }

    fn check(&self, value: Option<&FieldValue>) -> Vec<Violation> {
        match value {
            None | Some(FieldValue::Null) => self.no_selection(),
            Some(FieldValue::Text(v)) if v.is_empty() => self.no_selection(),
            Some(FieldValue::Text(v)) if self.domain.contains(v.as_str()) => Vec::new(),
            Some(FieldValue::Text(_)) => {
                let values: Vec<&str> = self.domain.iter().map(String::as_str).collect();
                vec![Violation::new(
                    ViolationKind::NotAnOption,
                    format!("{} must be one of: {}", self.label, values.join(", ")),
                )]
            }
            Some(other) => vec![invalid_type(&self.label, "text", other)],
        }
    }

    fn no_selection(&self) -> Vec<Violation> {
        if self.required {
            vec![Violation::new(
                ViolationKind::Required,
                format!("{} is required", self.label),
            )]
        } else {
            Vec::new()
        }
    }
}

fn invalid_type(label: &str, expected: &str, got: &FieldValue) -> Violation {
    Violation::new(
        ViolationKind::InvalidType,
        format!("{label} expects {expected}, got {}", got.type_name()),
    )
}

/// Whole-record validator compiled from a configuration
#[derive(Debug, Clone)]
pub struct FormSchema {
    fields: Vec<(String, FieldRules)>,
}

impl FormSchema {
    /// Validate a record
    ///
    /// Values for names outside the configuration are dropped from the
    /// result. On failure every failing field is reported.
    pub fn validate(&self, input: &FormInput) -> Result<ValidatedRecord, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut record = ValidatedRecord::default();

        for (name, rules) in &self.fields {
            let value = input.get(name);
            let violations = rules.check(value);
            if violations.is_empty() {
                if let Some(value) = rules.normalize(value) {
                    record.insert(name, value);
                }
            } else {
                errors.insert(name.clone(), violations);
            }
        }

        if errors.is_empty() {
            Ok(record)
        } else {
            tracing::debug!(failed = errors.len(), "record failed validation");
            Err(errors)
        }
    }

    /// Validate a single field; `None` if the name is not configured
    #[must_use]
    pub fn validate_field(&self, name: &str, value: &FieldValue) -> Option<Vec<Violation>> {
        self.rules(name).map(|rules| rules.check(Some(value)))
    }

    /// Rule set of a field
    #[must_use]
    pub fn rules(&self, name: &str) -> Option<&FieldRules> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Configured field names, in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}
