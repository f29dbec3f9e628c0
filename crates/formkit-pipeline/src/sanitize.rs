//! Payload sanitization
//!
//! Before persistence, top-level entries whose value is an empty string,
//! null, an empty array or an empty object are dropped. Nested values are
//! left alone.

use serde_json::{Map, Value};

/// Whether a value counts as empty for persistence
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Drop empty entries in place, returning the removed keys
pub fn sanitize(payload: &mut Map<String, Value>) -> Vec<String> {
    let removed: Vec<String> = payload
        .iter()
        .filter(|(_, v)| is_empty_value(v))
        .map(|(k, _)| k.clone())
        .collect();

    payload.retain(|_, v| !is_empty_value(v));

    removed
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
    fn drops_empty_string_and_list() {
        let mut payload = object(json!({"title": "ok", "description": "", "photos": []}));
        let removed = sanitize(&mut payload);

        assert_eq!(Value::Object(payload), json!({"title": "ok"}));
        assert_eq!(removed, ["description", "photos"]);
    }

    #[test]
    fn drops_null_and_empty_object() {
        let mut payload = object(json!({"a": null, "b": {}, "c": {"d": ""}}));
        sanitize(&mut payload);
        // nested empties survive
        assert_eq!(Value::Object(payload), json!({"c": {"d": ""}}));
    }

    #[test]
    fn keeps_falsy_scalars() {
        let mut payload = object(json!({"flag": false, "count": 0, "space": " "}));
        assert!(sanitize(&mut payload).is_empty());
        assert_eq!(payload.len(), 3);
    }
}
