//! Builds the `content` display column from selected payload and derived fields

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Collect allow-listed fields for one record.
///
/// A payload value wins when present and non-null, otherwise a non-empty
/// derived value is used; names with neither are left out. Keys come back sorted.
pub fn extract_fields<'d>(
    allow_list: &[String],
    payload: &Map<String, Value>,
    derived: impl Fn(&str) -> Option<&'d str>,
) -> BTreeMap<String, Value> {
    let mut extracted = BTreeMap::new();
    for name in allow_list {
        if let Some(value) = payload.get(name).filter(|v| !v.is_null()) {
            extracted.insert(name.clone(), value.clone());
            continue;
        }
        if let Some(value) = derived(name).filter(|v| !v.is_empty()) {
            extracted.insert(name.clone(), Value::String(value.to_string()));
        }
    }
    extracted
}

/// `message` followed by the JSON-encoded extracted fields
pub fn content_line(message: &str, extracted: &BTreeMap<String, Value>) -> String {
    format!("{} {}", message, json_text(extracted))
}

/// Encode as compact JSON; encoding failures degrade to `{}`
pub fn json_text<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
