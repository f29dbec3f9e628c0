//! Bundled service implementations
//!
//! - [`memory`]: process-local stores for tests and previews
//! - [`fs`]: local directory stores used by the command line host

pub mod fs;
pub mod memory;

pub use fs::{JsonDocumentStore, LocalBlobStorage};
pub use memory::{InMemoryBlobStorage, InMemoryDocumentStore, LogNotifier, StaticSession};

use crate::services::{Document, DocumentValue};
use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};

/// Replace server timestamps with `now_millis` rendered as RFC 3339
pub fn resolve_document(document: Document, now_millis: i64) -> Map<String, Value> {
    document
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                DocumentValue::Value(v) => v,
                DocumentValue::ServerTimestamp => DateTime::from_timestamp_millis(now_millis)
                    .map_or(Value::from(now_millis), |t| {
                        Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true))
                    }),
            };
            (key, value)
        })
        .collect()
}

/// Merge `source` into `target`
///
/// Objects merge key by key, recursively. Any other value, arrays included,
/// replaces what was stored. Keys absent from `source` are kept.
pub fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge_into(existing, incoming),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn merge_keeps_absent_keys_and_replaces_arrays() {
        let mut stored = object(json!({"title": "a", "photos": ["x", "y"], "meta": {"a": 1, "b": 2}}));
        merge_into(&mut stored, object(json!({"photos": ["z"], "meta": {"b": 3}})));

        assert_eq!(
            Value::Object(stored),
            json!({"title": "a", "photos": ["z"], "meta": {"a": 1, "b": 3}})
        );
    }

    #[test]
    fn server_timestamp_resolves_to_rfc3339() {
        let mut document = Document::new();
        document.insert("title".into(), DocumentValue::Value(json!("ok")));
        document.insert("createdAt".into(), DocumentValue::ServerTimestamp);

        let resolved = resolve_document(document, 1_700_000_000_000);
        assert_eq!(
            Value::Object(resolved),
            json!({"title": "ok", "createdAt": "2023-11-14T22:13:20.000Z"})
        );
    }
}
