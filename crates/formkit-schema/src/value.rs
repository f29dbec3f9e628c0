//! Submitted values
//!
//! A form input is an ordered map from field name to [`FieldValue`]. File
//! payloads are carried as [`FileHandle`]s whose bytes are reference counted,
//! so cloning a record never copies attachment contents.

use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A file selected for an image-set field
#[derive(Clone, PartialEq, Eq)]
pub struct FileHandle {
    name: String,
    mime_type: String,
    bytes: Bytes,
}

impl FileHandle {
    /// Create a file handle from its original name, MIME type and contents
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Original file name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type reported for the file
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// File contents
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Size in bytes
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size in mebibytes
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> f64 {
        self.size() as f64 / BYTES_PER_MB
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size())
            .finish()
    }
}

/// Value bound to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Explicitly cleared
    Null,
    /// Text, text area and select values
    Text(String),
    /// Files selected for an image-set field
    Files(Vec<FileHandle>),
}

impl FieldValue {
    /// Borrow as text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a file list
    #[must_use]
    pub fn as_files(&self) -> Option<&[FileHandle]> {
        match self {
            Self::Files(files) => Some(files),
            _ => None,
        }
    }

    /// Null, empty text or an empty file list
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::Files(files) => files.is_empty(),
        }
    }

    /// Short name of the variant, for diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Files(_) => "files",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<FileHandle>> for FieldValue {
    fn from(files: Vec<FileHandle>) -> Self {
        Self::Files(files)
    }
}

/// Raw values submitted for a form, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    values: IndexMap<String, FieldValue>,
}

impl FormInput {
    /// Create an empty input
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set the value of a field, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Value of a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Whether a value is present for the field
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No values at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FormInput {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut input = Self::new();
        for (k, v) in iter {
            input.insert(k, v);
        }
        input
    }
}

/// Input that passed validation, restricted to configured fields
///
/// Field order follows the configuration. Image-set fields are always present
/// (defaulting to an empty file list); other fields are present only if a
/// value was submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedRecord {
    values: IndexMap<String, FieldValue>,
}

impl ValidatedRecord {
    pub(crate) fn insert(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_owned(), value);
    }

    /// Value of a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Iterate in configuration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields carried
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No fields carried
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take ownership of the values
    #[must_use]
    pub fn into_values(self) -> IndexMap<String, FieldValue> {
        self.values
    }
}
