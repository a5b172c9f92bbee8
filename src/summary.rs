//! Reduces a raw record to a one-line, redacted summary.
//!
//! The summary text comes from the first step that yields something:
//! requested summary fields, `textPayload`, a `message` key inside the
//! structured payload, and finally the serialized payload (or record),
//! truncated to 200 characters.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::model::{LogRecord, LogSummary};
use crate::path::{leaf_name, resolve};
use crate::redact::{redact, redact_opt};
use crate::timestamp;

pub const FIELD_DELIMITER: &str = " | ";
pub const MAX_SUMMARY_CHARS: usize = 200;
const ELLIPSIS: &str = "...";

const MAX_SEARCH_DEPTH: usize = 32;
const MAX_SEARCH_NODES: usize = 10_000;

/// Summary keys that requested fields may not overwrite.
const RESERVED_KEYS: [&str; 4] = ["insertId", "timestamp", "severity", "summary"];

pub fn summarize(record: &LogRecord, summary_fields: Option<&[String]>) -> LogSummary {
    let fields = summary_fields.unwrap_or_default();
    let view = (!fields.is_empty()).then(|| record.to_value());

    let mut extra = Map::new();
    if let Some(view) = &view {
        for path in fields {
            let key = leaf_name(path);
            if RESERVED_KEYS.contains(&key) {
                continue;
            }
            if let Some(value) = resolve(view, path) {
                extra.insert(key.to_string(), redact_value(value));
            }
        }
    }

    LogSummary {
        insert_id: record.log_id().map(str::to_string),
        timestamp: timestamp::normalize(record.timestamp_value()),
        severity: record.severity(),
        summary: summary_text(record, view.as_ref(), fields),
        fields: extra,
    }
}

/// Summary string only. `view` is the record's JSON form when fields were requested.
fn summary_text(record: &LogRecord, view: Option<&Value>, fields: &[String]) -> String {
    if let Some(view) = view {
        let parts: Vec<String> = fields
            .iter()
            .filter_map(|path| resolve(view, path))
            .filter_map(stringify)
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return redact(&parts.join(FIELD_DELIMITER)).into_owned();
        }
    }

    let text = record
        .text_payload
        .as_ref()
        .and_then(stringify)
        .filter(|s| !s.is_empty());
    if let Some(redacted) = redact_opt(text.as_deref()) {
        return redacted.into_owned();
    }

    let payload = record.payload();
    if let Some(message) = payload.and_then(find_message) {
        return redact(&message).into_owned();
    }

    let serialized = match payload {
        Some(p) => p.to_string(),
        None => record.to_value().to_string(),
    };
    redact(&truncate(&serialized)).into_owned()
}

/// Depth-first search for the first non-empty `message` key, in document
/// order. A `message` directly on an object beats any nested one.
pub fn find_message(value: &Value) -> Option<String> {
    let mut budget = MAX_SEARCH_NODES;
    search_message(value, 0, &mut budget)
}

fn search_message(value: &Value, depth: usize, budget: &mut usize) -> Option<String> {
    if depth > MAX_SEARCH_DEPTH || *budget == 0 {
        return None;
    }
    *budget -= 1;

    match value {
        Value::Object(map) => {
            if let Some(found) = map
                .get("message")
                .and_then(stringify)
                .filter(|s| !s.is_empty())
            {
                return Some(found);
            }
            map.values()
                .filter(|v| v.is_object() || v.is_array())
                .find_map(|v| search_message(v, depth + 1, budget))
        }
        Value::Array(items) => items
            .iter()
            .filter(|v| v.is_object() || v.is_array())
            .find_map(|v| search_message(v, depth + 1, budget)),
        _ => None,
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_SUMMARY_CHARS {
        return text.to_string();
    }
    let keep = MAX_SUMMARY_CHARS - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Redacts every string leaf. Numbers that would be masked become strings.
fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact(s).into_owned()),
        Value::Number(n) => {
            let text = n.to_string();
            match redact(&text) {
                Cow::Borrowed(_) => value.clone(),
                Cow::Owned(masked) if masked == text => value.clone(),
                Cow::Owned(masked) => Value::String(masked),
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_value(v)))
                .collect(),
        ),
        Value::Bool(_) | Value::Null => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use serde_json::json;

    fn record(v: Value) -> LogRecord {
        serde_json::from_value(v).unwrap()
    }

    fn fields(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> LogRecord {
        record(json!({
            "insertId": "log-1",
            "textPayload": "Text message",
            "jsonPayload": {"message": "JSON message", "details": {"info": "More info"}},
            "metadata": {
                "insertId": "log-1",
                "timestamp": "2023-01-01T12:00:00Z",
                "severity": "ERROR",
                "labels": {"service": "api", "environment": "production"}
            }
        }))
    }

    #[test]
    fn summary_fields_are_joined() {
        let f = fields(&["metadata.labels.service", "metadata.labels.environment"]);
        let s = summarize(&sample(), Some(&f));
        assert_eq!(s.summary, "api | production");
        assert_eq!(s.fields.get("service"), Some(&json!("api")));
        assert_eq!(s.fields.get("environment"), Some(&json!("production")));
    }

    #[test]
    fn unresolved_fields_fall_back_to_text_payload() {
        let f = fields(&["nonexistent.field"]);
        let s = summarize(&sample(), Some(&f));
        assert_eq!(s.summary, "Text message");
        assert!(s.fields.is_empty());
    }

    #[test]
    fn text_payload_beats_json_payload() {
        let s = summarize(&sample(), None);
        assert_eq!(s.summary, "Text message");
        assert_eq!(s.insert_id.as_deref(), Some("log-1"));
        assert_eq!(s.severity, Severity::Error);
        assert_eq!(s.timestamp, "2023-01-01T12:00:00.000Z");
    }

    #[test]
    fn nested_message_in_json_payload() {
        let r = record(json!({
            "insertId": "n-1",
            "jsonPayload": {"data": {"info": {"message": "Nested message"}}}
        }));
        assert_eq!(summarize(&r, None).summary, "Nested message");
    }

    #[test]
    fn proto_payload_is_searched_too() {
        let r = record(json!({
            "protoPayload": {"status": {"code": 7, "message": "PERMISSION_DENIED on bucket"}}
        }));
        assert_eq!(summarize(&r, None).summary, "PERMISSION_DENIED on bucket");
    }

    #[test]
    fn direct_message_beats_nested_one() {
        let v = json!({"inner": {"message": "deep"}, "message": "top"});
        assert_eq!(find_message(&v).as_deref(), Some("top"));

        let v = json!({"a": [{"x": 1}, {"message": "in array"}], "b": {"message": "later"}});
        assert_eq!(find_message(&v).as_deref(), Some("in array"));

        assert_eq!(find_message(&json!({"data": {"text": "no"}})), None);
        assert_eq!(find_message(&json!("string")), None);
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut v = json!({"message": "too deep"});
        for _ in 0..100 {
            v = json!({ "wrap": v });
        }
        assert_eq!(find_message(&v), None);
    }

    #[test]
    fn long_payload_is_truncated() {
        let r = record(json!({"jsonPayload": {"longText": "a".repeat(300)}}));
        let s = summarize(&r, None);
        assert_eq!(s.summary.chars().count(), 200);
        assert!(s.summary.ends_with("..."));
    }

    #[test]
    fn whole_record_is_serialized_without_payload() {
        let r = record(json!({"data": {"foo": "bar"}}));
        let s = summarize(&r, None);
        assert!(s.summary.contains('{'));
        assert!(s.summary.contains("foo"));
        assert!(s.summary.contains("bar"));
        assert_eq!(s.severity, Severity::Default);
        assert!(s.timestamp.ends_with('Z'));
    }

    #[test]
    fn summaries_are_redacted() {
        let r = record(json!({"textPayload": "login by user@example.com from 10.1.2.3"}));
        let s = summarize(&r, None);
        assert!(!s.summary.contains("user@example.com"));
        assert!(!s.summary.contains("10.1.2.3"));

        let r = record(json!({"jsonPayload": {"user": "user@example.com"}}));
        let f = fields(&["jsonPayload.user"]);
        let s = summarize(&r, Some(&f));
        assert_eq!(s.summary, "user********.com");
        assert_eq!(s.fields.get("user"), Some(&json!("user********.com")));
    }

    #[test]
    fn structured_field_values_are_redacted_like_the_summary() {
        let r = record(json!({"jsonPayload": {
            "client": {"email": "user@example.com", "retries": 3, "admin": false},
            "card": 4111111111111111u64,
            "epoch": 1672574400000u64
        }}));
        let f = fields(&["jsonPayload.client", "jsonPayload.card", "jsonPayload.epoch"]);
        let s = summarize(&r, Some(&f));

        assert_eq!(
            s.fields.get("client"),
            Some(&json!({"email": "user********.com", "retries": 3, "admin": false}))
        );
        assert_eq!(s.fields.get("card"), Some(&json!("4111********1111")));
        assert_eq!(s.fields.get("epoch"), Some(&json!(1672574400000u64)));
        assert!(!s.summary.contains("user@example.com"));
        assert!(!s.summary.contains("4111111111111111"));
    }

    #[test]
    fn reserved_leaf_names_are_not_overwritten() {
        let f = fields(&["metadata.timestamp", "metadata.labels.service"]);
        let s = summarize(&sample(), Some(&f));
        assert_eq!(s.timestamp, "2023-01-01T12:00:00.000Z");
        assert!(!s.fields.contains_key("timestamp"));
        assert_eq!(s.summary, "2023-01-01T12:00:00Z | api");
    }
}
