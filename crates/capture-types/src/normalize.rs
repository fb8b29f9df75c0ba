//! Canonical record normalization
//!
//! Both engines describe the same row change with different key casing,
//! number encodings and table naming. Normalization removes those
//! differences so the two captures can be compared byte for byte:
//!
//! 1. every object key is lower-cased, at any depth
//! 2. numeric strings become JSON numbers (`"0123"` style padded values excepted)
//! 3. audit timestamp columns are optionally dropped
//! 4. table names lose their partition suffix and are lower-cased
//!
//! Every step is a pure function and re-applying it is a no-op.

use serde_json::{Map, Number, Value};

use crate::classify::{classify, strip_partition_suffix};
use crate::event::{ChangeEvent, NormalizedRecord, RowImage};

/// Audit columns removed when timestamp stripping is enabled.
pub const TIMESTAMP_COLUMNS: [&str; 3] = ["create_datetime", "update_datetime", "delete_datetime"];

/// Canonical table name: partition suffix removed, lower-cased.
pub fn normalize_table_name(table: &str) -> String {
    strip_partition_suffix(table).to_lowercase()
}

/// Normalizes a decoded event into a [`NormalizedRecord`].
pub fn normalize(event: &ChangeEvent, strip_timestamp_columns: bool) -> NormalizedRecord {
    let classification = classify(event);

    NormalizedRecord {
        table: classification.table.to_lowercase(),
        event_time: classification.event_time,
        action: classification.kind,
        before: event
            .before
            .clone()
            .map(|image| normalize_map(image, strip_timestamp_columns)),
        after: event
            .after
            .clone()
            .map(|image| normalize_map(image, strip_timestamp_columns)),
    }
}

impl NormalizedRecord {
    /// Re-applies normalization to an existing record.
    ///
    /// Used at finalize time to apply timestamp stripping to records that were
    /// buffered without it; on an already-normalized record with the same flag
    /// this returns an equal record. The table name is already canonical and
    /// is kept as is: stripping the partition suffix again would also remove
    /// a second `_p<n>` that belongs to the real table name.
    pub fn renormalize(&self, strip_timestamp_columns: bool) -> NormalizedRecord {
        NormalizedRecord {
            table: self.table.clone(),
            event_time: self.event_time,
            action: self.action,
            before: self
                .before
                .clone()
                .map(|image| normalize_map(image, strip_timestamp_columns)),
            after: self
                .after
                .clone()
                .map(|image| normalize_map(image, strip_timestamp_columns)),
        }
    }
}

/// Normalizes an arbitrary JSON value, recursing into objects and arrays.
pub fn normalize_value(value: Value, strip_timestamp_columns: bool) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map, strip_timestamp_columns)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize_value(item, strip_timestamp_columns))
                .collect(),
        ),
        Value::String(s) => match coerce_numeric(&s) {
            Some(n) => Value::Number(n),
            None => Value::String(s),
        },
        other => other,
    }
}

fn normalize_map(map: RowImage, strip_timestamp_columns: bool) -> RowImage {
    let mut normalized = Map::with_capacity(map.len());
    for (key, value) in map {
        let key = key.to_lowercase();
        if strip_timestamp_columns && TIMESTAMP_COLUMNS.contains(&key.as_str()) {
            continue;
        }
        normalized.insert(key, normalize_value(value, strip_timestamp_columns));
    }
    normalized
}

/// Converts a string to a JSON number when it is a plain numeral.
///
/// Returns `None` (leave the string alone) for:
/// - empty strings and anything with whitespace or non-numeric characters
/// - values longer than one character that start with `0`, such as zip codes
/// - integers too large for `i64`/`u64`, which would lose digits as floats
/// - non-finite floats
pub fn coerce_numeric(s: &str) -> Option<Number> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }

    if let Ok(i) = s.parse::<i64>() {
        return Some(i.into());
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(u.into());
    }
    if s.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-')) {
        return None;
    }

    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}
