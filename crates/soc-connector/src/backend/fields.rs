//! Field lookup helpers for backend-native JSON records

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// First present, non-null value among JSON pointer paths
pub fn lookup<'a>(record: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| record.pointer(path))
        .find(|value| !value.is_null())
}

/// Like [`lookup`], rendered as a non-empty string
pub fn string_field(record: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| record.pointer(path))
        .find_map(as_text)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339 strings or epoch seconds; anything else is "now"
pub fn timestamp_field(record: &Value, paths: &[&str]) -> DateTime<Utc> {
    lookup(record, paths)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z").ok().map(|dt| dt.with_timezone(&Utc)))
                .or_else(|| s.parse::<f64>().ok().and_then(from_epoch_seconds))
        }
        Value::Number(n) => n.as_f64().and_then(from_epoch_seconds),
        _ => None,
    }
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0) as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// Unwrap `{"result": {...}}` / `{"event": {...}}` envelopes
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            for key in ["result", "event"] {
                if map.get(key).is_some_and(Value::is_object) {
                    if let Some(inner) = map.remove(key) {
                        return inner;
                    }
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}
