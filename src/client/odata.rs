use serde_json::Value as JsonValue;

use crate::error::{internal_error, SharePointResult};

/// Strips the verbose `{"d": ...}` envelope when present.
pub fn unwrap_entity(body: &JsonValue) -> &JsonValue {
    body.get("d").unwrap_or(body)
}

pub fn into_entity(body: JsonValue) -> JsonValue {
    match body {
        JsonValue::Object(mut map) if map.contains_key("d") => {
            map.remove("d").unwrap_or(JsonValue::Null)
        }
        other => other,
    }
}

/// Extracts the rows of a collection response.
///
/// Accepts `{"d":{"results":[...]}}` (verbose), `{"value":[...]}` (minimal
/// metadata) and bare arrays.
pub fn into_results(body: JsonValue) -> SharePointResult<Vec<JsonValue>> {
    match into_entity(body) {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Object(mut map) => match map.remove("results").or_else(|| map.remove("value")) {
            Some(JsonValue::Array(items)) => Ok(items),
            _ => Err(internal_error("Collection response is missing its results array")),
        },
        _ => Err(internal_error("Collection response is not a JSON object")),
    }
}

/// Titles from a deferred-or-expanded navigation collection such as `Groups`.
pub fn result_titles(value: Option<&JsonValue>) -> Vec<String> {
    let items: &[JsonValue] = match value {
        Some(JsonValue::Array(items)) => items.as_slice(),
        Some(JsonValue::Object(map)) => match map.get("results") {
            Some(JsonValue::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    items
        .iter()
        .filter_map(|item| item.get("Title").and_then(JsonValue::as_str))
        .map(str::to_string)
        .collect()
}
