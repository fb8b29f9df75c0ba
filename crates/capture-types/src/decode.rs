//! Raw frame decoding
//!
//! Frames arrive as Debezium-style JSON envelopes:
//!
//! ```json
//! {
//!   "before": null,
//!   "after": {"ID": "5"},
//!   "source": {"name": "oracle", "table": "ORD_P1"},
//!   "op": "c",
//!   "ts_ms": 1000
//! }
//! ```
//!
//! A frame wrapped in `{"payload": {...}}` is unwrapped first. Only the source
//! name, table, row images and timestamp are interpreted; every other
//! top-level field ends up in [`ChangeEvent::extra`].

use serde_json::{Map, Value};

use crate::error::{DecodeError, Result};
use crate::event::{ChangeEvent, RowImage};

/// Decodes one raw text frame into a [`ChangeEvent`].
pub fn decode_frame(frame: &str) -> Result<ChangeEvent> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    decode_value(value)
}

/// Decodes an already-parsed JSON value into a [`ChangeEvent`].
pub fn decode_value(value: Value) -> Result<ChangeEvent> {
    let mut obj = match value {
        Value::Object(map) => map,
        other => return Err(DecodeError::NotAnObject(json_type_name(&other))),
    };

    if is_payload_envelope(&obj) {
        if let Some(payload) = obj.remove("payload") {
            return decode_value(payload);
        }
    }

    let source = obj.get("source").and_then(Value::as_object);

    let source_name = source
        .and_then(|s| s.get("name"))
        .or_else(|| obj.get("source_name"))
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or(DecodeError::MissingField("source.name"))?;

    let table = source
        .and_then(|s| s.get("table"))
        .or_else(|| obj.get("table"))
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or(DecodeError::MissingField("source.table"))?;

    let timestamp_millis = timestamp_millis(&obj)?;

    let before = row_image(obj.remove("before"), "before")?;
    let after = row_image(obj.remove("after"), "after")?;
    if before.is_none() && after.is_none() {
        return Err(DecodeError::NoRowImage);
    }

    let op = match obj.remove("op") {
        Some(Value::String(op)) => Some(op),
        _ => None,
    };

    obj.remove("source_name");
    obj.remove("table");

    Ok(ChangeEvent {
        source_name,
        table,
        before,
        after,
        timestamp_millis,
        op,
        extra: obj,
    })
}

/// `{"schema": ..., "payload": {...}}` as emitted by Debezium's JSON converter.
fn is_payload_envelope(obj: &Map<String, Value>) -> bool {
    matches!(obj.get("payload"), Some(Value::Object(_)))
        && !obj.contains_key("before")
        && !obj.contains_key("after")
        && !obj.contains_key("source")
}

fn row_image(value: Option<Value>, field: &'static str) -> Result<Option<RowImage>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            expected: "an object or null",
        }),
    }
}

/// Reads `ts_ms`, falling back to `ts_us` and `ts_ns` scaled down to milliseconds.
fn timestamp_millis(obj: &Map<String, Value>) -> Result<i64> {
    const FIELDS: [(&str, i64); 3] = [("ts_ms", 1), ("ts_us", 1_000), ("ts_ns", 1_000_000)];

    for (field, divisor) in FIELDS {
        let Some(value) = obj.get(field) else {
            continue;
        };
        return integer(value)
            .map(|n| n.div_euclid(divisor))
            .ok_or(DecodeError::InvalidField {
                field,
                expected: "an integer timestamp",
            });
    }

    Err(DecodeError::MissingField("ts_ms"))
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
