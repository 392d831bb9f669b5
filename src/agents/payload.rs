//! Structured payload extraction from free-form model answers.
//!
//! Extraction is best effort: a failure is reported as
//! [`StructuredPayloadParseError`] and the caller decides whether to care.

use serde_json::{json, Deserializer, Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuredPayloadParseError {
    #[error("no JSON object found in model output")]
    NotFound,

    #[error("JSON object is missing required keys: {0:?}")]
    MissingKeys(Vec<String>),

    #[error("invalid JSON in fenced block: {0}")]
    InvalidJson(String),
}

/// Every JSON value inside ```` ```json ```` fences, in order of appearance.
///
/// Blocks that fail to parse are returned as errors in place.
pub fn fenced_json_blocks(text: &str) -> Vec<Result<Value, StructuredPayloadParseError>> {
    const OPEN: &str = "```json";
    const CLOSE: &str = "```";

    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let body_start = start + OPEN.len();
        let Some(len) = rest[body_start..].find(CLOSE) else {
            break;
        };
        let body = rest[body_start..body_start + len].trim();
        blocks.push(
            serde_json::from_str::<Value>(body)
                .map_err(|e| StructuredPayloadParseError::InvalidJson(e.to_string())),
        );
        rest = &rest[body_start + len + CLOSE.len()..];
    }
    blocks
}

/// Every top-level JSON object embedded anywhere in `text`, fenced or not.
///
/// Scans from each `{` and keeps the first value that deserializes there;
/// objects nested inside an accepted one are not reported separately.
pub fn embedded_json_objects(text: &str) -> Vec<Map<String, Value>> {
    let mut objects = Vec::new();
    let mut offset = 0;

    while let Some(rel) = text[offset..].find('{') {
        let start = offset + rel;
        let mut values = Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Object(map))) => {
                offset = start + values.byte_offset();
                objects.push(map);
            }
            _ => offset = start + 1,
        }
    }
    objects
}

/// First JSON object that contains every key in `required`.
///
/// Fenced blocks are preferred over loose objects.
pub fn find_object_with_keys(
    text: &str,
    required: &[&str],
) -> Result<Map<String, Value>, StructuredPayloadParseError> {
    let has_all = |map: &Map<String, Value>| required.iter().all(|k| map.contains_key(*k));

    let mut fenced_error = None;
    for block in fenced_json_blocks(text) {
        match block {
            Ok(Value::Object(map)) if has_all(&map) => return Ok(map),
            Ok(_) => {}
            Err(err) => fenced_error = fenced_error.or(Some(err)),
        }
    }

    let objects = embedded_json_objects(text);
    if let Some(map) = objects.iter().find(|m| has_all(m)) {
        return Ok(map.clone());
    }

    if let Some(err) = fenced_error {
        return Err(err);
    }
    if objects.is_empty() {
        return Err(StructuredPayloadParseError::NotFound);
    }
    let missing = required
        .iter()
        .filter(|k| !objects.iter().any(|m| m.contains_key(**k)))
        .map(|k| k.to_string())
        .collect::<Vec<_>>();
    Err(StructuredPayloadParseError::MissingKeys(if missing.is_empty() {
        required.iter().map(|k| k.to_string()).collect()
    } else {
        missing
    }))
}

/// `open_map` payloads for every fenced location object with numeric coordinates.
pub fn location_payloads(text: &str) -> Vec<Value> {
    fenced_json_blocks(text)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|value| {
            let lat = value.get("latitude").and_then(Value::as_f64)?;
            let lng = value.get("longitude").and_then(Value::as_f64)?;
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown place");
            let address = value
                .get("address")
                .and_then(Value::as_str)
                .unwrap_or("Address unknown");
            Some(json!({
                "action": "open_map",
                "lat": lat,
                "lng": lng,
                "name": name,
                "address": address,
            }))
        })
        .collect()
}

/// `calories_result` payload built from the first object carrying `food_items`.
pub fn calories_payload(text: &str) -> Result<Value, StructuredPayloadParseError> {
    let data = find_object_with_keys(text, &["food_items"])?;
    Ok(json!({
        "action": "calories_result",
        "food_items": data.get("food_items").cloned().unwrap_or_else(|| json!([])),
        "total_calories": data.get("total_calories").cloned().unwrap_or_else(|| json!(0)),
        "overall_advice": data.get("overall_advice").cloned().unwrap_or_else(|| json!("")),
    }))
}
