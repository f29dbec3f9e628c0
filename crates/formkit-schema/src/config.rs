//! Form configuration
//!
//! A [`FormConfiguration`] is built once per view and is immutable afterwards.
//! Every invariant is checked at construction so that a malformed form fails
//! fast instead of at submission time:
//! - field names are non-empty and unique
//! - text length bounds are ordered
//! - image-set count and size bounds are positive
//! - required selects have options, and option values are unique
//! - loaded documents carry no unknown keys, and no constraint keys of
//!   another field kind
//!
//! Configurations can be assembled with [`FormConfiguration::builder`] or
//! loaded from YAML or JSON.

use crate::error::ConfigurationError;
use crate::field::{FieldDescriptor, FieldKind, COMMON_FIELD_KEYS};
use crate::schema::{FormSchema, SchemaBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Default name of the server-assigned creation timestamp
pub const DEFAULT_TIMESTAMP_FIELD: &str = "createdAt";

/// Location of the persisted document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistencePath {
    /// Collection name
    pub collection: String,
    /// Document identifier within the collection
    pub document_id: String,
}

impl PersistencePath {
    /// Create a persistence path
    #[must_use]
    pub fn new(collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document_id: document_id.into(),
        }
    }
}

impl fmt::Display for PersistencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.document_id)
    }
}

/// Keys accepted at the top level of a configuration document
const TOP_LEVEL_KEYS: &[&str] = &["fields", "persistence_path", "blob_storage_path", "timestamp_field"];

fn default_timestamp_field() -> String {
    DEFAULT_TIMESTAMP_FIELD.to_owned()
}

/// On-disk shape, validated into a [`FormConfiguration`]
#[derive(Debug, Deserialize)]
struct RawFormConfiguration {
    fields: Vec<FieldDescriptor>,
    #[serde(default)]
    persistence_path: Option<PersistencePath>,
    #[serde(default)]
    blob_storage_path: Option<String>,
    #[serde(default = "default_timestamp_field")]
    timestamp_field: String,
}

/// Immutable, validated form configuration
#[derive(Debug, Clone, Serialize)]
pub struct FormConfiguration {
    fields: Vec<FieldDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persistence_path: Option<PersistencePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blob_storage_path: Option<String>,
    timestamp_field: String,
}

impl FormConfiguration {
    /// Start building a configuration
    #[inline]
    #[must_use]
    pub fn builder() -> FormConfigurationBuilder {
        FormConfigurationBuilder::default()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigurationError> {
        let document: Value = serde_yaml::from_str(source).map_err(|e| ConfigurationError::syntax("yaml", e))?;
        Self::try_from(parse_document(document, "yaml")?)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(source: &str) -> Result<Self, ConfigurationError> {
        let document: Value = serde_json::from_str(source).map_err(|e| ConfigurationError::syntax("json", e))?;
        Self::try_from(parse_document(document, "json")?)
    }

    /// Load from a `.yaml`, `.yml` or `.json` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::io_error(path, e))?;
        let origin = path.display().to_string();

        let document: Value = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&source)
                .map_err(|e| ConfigurationError::syntax(&origin, e))?,
            "json" => serde_json::from_str(&source)
                .map_err(|e| ConfigurationError::syntax(&origin, e))?,
            other => return Err(ConfigurationError::UnsupportedFormat(other.to_owned())),
        };
        let raw = parse_document(document, &origin)?;

        tracing::debug!(path = %path.display(), fields = raw.fields.len(), "loaded form configuration");
        Self::try_from(raw)
    }

    /// Fields in declaration order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Image-set fields in declaration order
    pub fn image_set_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_image_set())
    }

    /// Where the record is persisted, if anywhere
    #[inline]
    #[must_use]
    pub fn persistence_path(&self) -> Option<&PersistencePath> {
        self.persistence_path.as_ref()
    }

    /// Prefix for uploaded attachments
    #[inline]
    #[must_use]
    pub fn blob_storage_path(&self) -> Option<&str> {
        self.blob_storage_path.as_deref()
    }

    /// Name of the server-assigned creation timestamp in persisted records
    #[inline]
    #[must_use]
    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }

    /// Compile the validation schema for this configuration
    #[must_use]
    pub fn schema(&self) -> FormSchema {
        SchemaBuilder::build(self)
    }

    /// Check every invariant
    fn validate(&self) -> Result<(), ConfigurationError> {
        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(self.fields.len());

        for (position, field) in self.fields.iter().enumerate() {
            if field.name().trim().is_empty() {
                return Err(ConfigurationError::EmptyFieldName { position });
            }
            if let Some(first) = seen.insert(field.name(), position) {
                return Err(ConfigurationError::DuplicateFieldName {
                    name: field.name().to_owned(),
                    first,
                    second: position,
                });
            }
            Self::validate_field(field)?;
        }

        if let Some(path) = &self.persistence_path {
            if path.collection.trim().is_empty() {
                return Err(ConfigurationError::InvalidPersistencePath {
                    reason: "empty collection".into(),
                });
            }
            if path.document_id.trim().is_empty() {
                return Err(ConfigurationError::InvalidPersistencePath {
                    reason: "empty document id".into(),
                });
            }
        }

        if matches!(&self.blob_storage_path, Some(p) if p.is_empty()) {
            return Err(ConfigurationError::EmptyBlobStoragePath);
        }

        if self.timestamp_field.trim().is_empty() {
            return Err(ConfigurationError::InvalidTimestampField {
                name: self.timestamp_field.clone(),
                reason: "empty name".into(),
            });
        }
        if seen.contains_key(self.timestamp_field.as_str()) {
            return Err(ConfigurationError::InvalidTimestampField {
                name: self.timestamp_field.clone(),
                reason: "collides with a form field".into(),
            });
        }

        Ok(())
    }

    fn validate_field(field: &FieldDescriptor) -> Result<(), ConfigurationError> {
        let name = || field.name().to_owned();

        match field.kind() {
            FieldKind::SingleLine(c) | FieldKind::MultiLine(c) => {
                if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
                    if min > max {
                        return Err(ConfigurationError::InvalidLengthBounds {
                            field: name(),
                            min,
                            max,
                        });
                    }
                }
            }
            FieldKind::ImageSet(c) => {
                if c.max_count == Some(0) {
                    return Err(ConfigurationError::InvalidMaxCount { field: name() });
                }
                if let Some(mb) = c.max_size_mb {
                    if !(mb.is_finite() && mb > 0.0) {
                        return Err(ConfigurationError::InvalidMaxSize {
                            field: name(),
                            value: mb,
                        });
                    }
                }
            }
            FieldKind::Select(c) => {
                if field.is_required() && c.options.is_empty() {
                    return Err(ConfigurationError::EmptyOptions { field: name() });
                }
                let mut values = HashSet::with_capacity(c.options.len());
                for option in &c.options {
                    if !values.insert(option.value.as_str()) {
                        return Err(ConfigurationError::DuplicateOption {
                            field: name(),
                            value: option.value.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<RawFormConfiguration> for FormConfiguration {
    type Error = ConfigurationError;

    fn try_from(raw: RawFormConfiguration) -> Result<Self, Self::Error> {
        let config = Self {
            fields: raw.fields,
            persistence_path: raw.persistence_path,
            blob_storage_path: raw.blob_storage_path.map(normalize_prefix),
            timestamp_field: raw.timestamp_field,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_document(document: Value, origin: &str) -> Result<RawFormConfiguration, ConfigurationError> {
    check_keys(&document)?;
    serde_json::from_value(document).map_err(|e| ConfigurationError::syntax(origin, e))
}

/// Reject keys that deserialization would drop silently
///
/// Shape errors (a missing `fields`, an unknown kind) are left to serde.
fn check_keys(document: &Value) -> Result<(), ConfigurationError> {
    let Some(top) = document.as_object() else {
        return Ok(());
    };
    if let Some(key) = top.keys().find(|k| !TOP_LEVEL_KEYS.contains(&k.as_str())) {
        return Err(ConfigurationError::UnknownKey { key: key.clone() });
    }

    let fields = top.get("fields").and_then(Value::as_array).map_or(&[][..], Vec::as_slice);
    for field in fields.iter().filter_map(Value::as_object) {
        let Some(kind) = field.get("kind").and_then(Value::as_str) else {
            continue;
        };
        let Some(constraints) = FieldKind::constraint_keys(kind) else {
            continue;
        };

        let stray = field
            .keys()
            .map(String::as_str)
            .find(|k| !COMMON_FIELD_KEYS.contains(k) && !constraints.contains(k));
        if let Some(key) = stray {
            return Err(ConfigurationError::UnsupportedKey {
                field: field.get("name").and_then(Value::as_str).unwrap_or_default().to_owned(),
                key: key.to_owned(),
                kind: kind.to_owned(),
            });
        }
    }

    Ok(())
}

fn normalize_prefix(path: String) -> String {
    path.trim_end_matches('/').to_owned()
}

/// Builder for [`FormConfiguration`]
#[derive(Debug, Clone)]
pub struct FormConfigurationBuilder {
    fields: Vec<FieldDescriptor>,
    persistence_path: Option<PersistencePath>,
    blob_storage_path: Option<String>,
    timestamp_field: String,
}

impl Default for FormConfigurationBuilder {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            persistence_path: None,
            blob_storage_path: None,
            timestamp_field: default_timestamp_field(),
        }
    }
}

impl FormConfigurationBuilder {
    /// Append a field
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Append several fields
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Persist submissions into `collection/document_id`
    #[must_use]
    pub fn persist_to(mut self, collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        self.persistence_path = Some(PersistencePath::new(collection, document_id));
        self
    }

    /// Upload attachments under this prefix
    #[must_use]
    pub fn blob_storage_path(mut self, path: impl Into<String>) -> Self {
        self.blob_storage_path = Some(path.into());
        self
    }

    /// Override the timestamp field name
    #[must_use]
    pub fn timestamp_field(mut self, name: impl Into<String>) -> Self {
        self.timestamp_field = name.into();
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<FormConfiguration, ConfigurationError> {
        FormConfiguration::try_from(RawFormConfiguration {
            fields: self.fields,
            persistence_path: self.persistence_path,
            blob_storage_path: self.blob_storage_path,
            timestamp_field: self.timestamp_field,
        })
    }
}
