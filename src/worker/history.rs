//! Bounding iterative history.
//!
//! Review loops append `result1`, `verified1`, `feedback1`, `result2`, ... to
//! the data they pass along. Workers that only care about the latest round can
//! call [`compact_history`] from [`super::Worker::prepare_input`] and
//! [`super::Worker::prepare_output`].

use serde_json::{Map, Value};

fn result_number(key: &str) -> Option<u64> {
    key.strip_prefix("result")
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
}

fn latest_result(data: &Map<String, Value>) -> Option<(&String, u64)> {
    data.keys()
        .filter_map(|k| result_number(k).map(|n| (k, n)))
        .max_by_key(|(_, n)| *n)
}

/// Keep `input` and the latest `result<N>` of a data object, dropping the rest.
fn compact_data(data: &Map<String, Value>) -> Map<String, Value> {
    let mut cleaned = Map::new();
    if let Some(input) = data.get("input") {
        cleaned.insert("input".to_string(), input.clone());
    }
    if let Some((key, _)) = latest_result(data) {
        cleaned.insert(key.clone(), data[key].clone());
    }
    cleaned
}

/// Drop all but the most recent round of an iterative history.
///
/// For a status envelope (`status` + `message`), keeps the status, message,
/// `verification_results` and a compacted `data` object. For any other object,
/// keeps `input`, the highest-numbered `result<N>` and its matching
/// `verified<N>` / `feedback<N>`. Non-objects pass through unchanged.
pub fn compact_history(value: Value) -> Value {
    let data = match value {
        Value::Object(data) => data,
        other => return other,
    };

    if data.contains_key("status") && data.contains_key("message") {
        let mut cleaned = Map::new();
        cleaned.insert(
            "status".to_string(),
            data.get("status").cloned().unwrap_or(Value::Null),
        );
        cleaned.insert(
            "message".to_string(),
            data.get("message").cloned().unwrap_or(Value::Null),
        );
        if let Some(results) = data.get("verification_results") {
            cleaned.insert("verification_results".to_string(), results.clone());
        }
        if let Some(Value::Object(inner)) = data.get("data") {
            cleaned.insert("data".to_string(), Value::Object(compact_data(inner)));
        }
        return Value::Object(cleaned);
    }

    let mut cleaned = compact_data(&data);
    if let Some((_, n)) = latest_result(&data) {
        for prefix in ["verified", "feedback"] {
            let key = format!("{}{}", prefix, n);
            if let Some(value) = data.get(&key) {
                cleaned.insert(key, value.clone());
            }
        }
    }
    Value::Object(cleaned)
}
