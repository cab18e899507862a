//! Nested objects to dot-joined keys

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Separator between key path segments
pub const KEY_SEPARATOR: char = '.';

/// Flatten a decoded object into `key -> string value`
///
/// Arrays are kept as leaves holding their JSON text; strings stay verbatim;
/// other scalars use their JSON text. Empty objects contribute no keys.
#[must_use]
pub fn flatten(root: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in root {
        flatten_into(key.clone(), value, &mut out);
    }
    out
}

fn flatten_into(prefix: String, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(format!("{prefix}{KEY_SEPARATOR}{key}"), child, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix, s.clone());
        }
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}

/// Segments of a flattened key
///
/// Segments that themselves contained the separator cannot be told apart;
/// span lookup treats them as nested.
pub fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split(KEY_SEPARATOR)
}
