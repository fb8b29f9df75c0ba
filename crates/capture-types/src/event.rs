//! Change event and canonical record data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Column name to value mapping carried in a row image.
pub type RowImage = Map<String, Value>;

/// A decoded row-change event, exactly as the feed described it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Name of the engine that emitted the event (e.g. "oracle", "postgres")
    pub source_name: String,
    /// Raw table name, possibly partition-suffixed and in any casing
    pub table: String,
    /// Row image before the change
    pub before: Option<RowImage>,
    /// Row image after the change
    pub after: Option<RowImage>,
    /// Event time in milliseconds since the Unix epoch
    pub timestamp_millis: i64,
    /// Explicit operation code, if the feed sent one. Informational only.
    pub op: Option<String>,
    /// Top-level fields the decoder does not interpret
    pub extra: Map<String, Value>,
}

/// Kind of row mutation, derived from the presence of row images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    /// The literal name used both on the wire and as the sort key.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one of the two compared engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Oracle,
    Postgres,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Oracle, Source::Postgres];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Oracle => "oracle",
            Source::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oracle" => Ok(Source::Oracle),
            "postgres" => Ok(Source::Postgres),
            other => Err(format!("Unknown source: {other}")),
        }
    }
}

/// The canonical, engine-agnostic form of one row mutation.
///
/// Fields are private so a record cannot change after normalization; use
/// [`NormalizedRecord::renormalize`] to derive a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub(crate) table: String,
    #[serde(rename = "create_datetime", with = "iso_millis")]
    pub(crate) event_time: DateTime<Utc>,
    pub(crate) action: MutationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) before: Option<RowImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) after: Option<RowImage>,
}

impl NormalizedRecord {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn action(&self) -> MutationKind {
        self.action
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    pub fn before(&self) -> Option<&RowImage> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&RowImage> {
        self.after.as_ref()
    }

    /// Event time as ISO-8601 with millisecond precision, e.g. `2024-01-01T00:00:01.000Z`.
    pub fn event_time_iso(&self) -> String {
        iso_millis::format(&self.event_time)
    }

    /// Form handed to the store. With `timestamp_columns_stripped` the
    /// record's own `create_datetime` key is dropped as well.
    ///
    /// Keys serialize in the historical capture order: `table`,
    /// `create_datetime`, `action`, `before`, `after`.
    pub fn stored_form(&self, timestamp_columns_stripped: bool) -> StoredRecord<'_> {
        StoredRecord {
            table: &self.table,
            event_time: (!timestamp_columns_stripped).then(|| self.event_time_iso()),
            action: self.action,
            before: self.before.as_ref(),
            after: self.after.as_ref(),
        }
    }
}

/// Borrowed, serialize-only view of a [`NormalizedRecord`] as written to a
/// capture file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord<'a> {
    table: &'a str,
    #[serde(rename = "create_datetime", skip_serializing_if = "Option::is_none")]
    event_time: Option<String>,
    action: MutationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<&'a RowImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<&'a RowImage>,
}

/// Both sources' records for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecords {
    pub oracle: Vec<NormalizedRecord>,
    pub postgres: Vec<NormalizedRecord>,
}

impl SourceRecords {
    pub fn get(&self, source: Source) -> &[NormalizedRecord] {
        match source {
            Source::Oracle => &self.oracle,
            Source::Postgres => &self.postgres,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.oracle.is_empty() && self.postgres.is_empty()
    }

    pub fn total(&self) -> usize {
        self.oracle.len() + self.postgres.len()
    }
}

pub(crate) mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_source_from_str_is_case_insensitive() {
        assert_eq!("Oracle".parse::<Source>().unwrap(), Source::Oracle);
        assert_eq!("POSTGRES".parse::<Source>().unwrap(), Source::Postgres);
        assert!("mysql".parse::<Source>().is_err());
    }

    #[test]
    fn test_record_serializes_with_historical_keys() {
        let record = NormalizedRecord {
            table: "ord".to_string(),
            event_time: Utc.timestamp_millis_opt(1000).unwrap(),
            action: MutationKind::Insert,
            before: None,
            after: Some(json!({"id": 5}).as_object().unwrap().clone()),
        };

        let value = serde_json::to_value(record.stored_form(false)).unwrap();
        assert_eq!(
            value,
            json!({
                "table": "ord",
                "create_datetime": "1970-01-01T00:00:01.000Z",
                "action": "insert",
                "after": {"id": 5}
            })
        );
        assert_eq!(serde_json::to_value(&record).unwrap(), value);

        let stripped = serde_json::to_value(record.stored_form(true)).unwrap();
        assert!(stripped.get("create_datetime").is_none());
        assert_eq!(stripped["action"], "insert");
    }

    #[test]
    fn test_stored_form_keeps_historical_key_order() {
        let record = NormalizedRecord {
            table: "ord".to_string(),
            event_time: Utc.timestamp_millis_opt(1000).unwrap(),
            action: MutationKind::Update,
            before: Some(json!({"id": 5}).as_object().unwrap().clone()),
            after: Some(json!({"id": 6}).as_object().unwrap().clone()),
        };

        assert_eq!(
            serde_json::to_string(&record.stored_form(false)).unwrap(),
            r#"{"table":"ord","create_datetime":"1970-01-01T00:00:01.000Z","action":"update","before":{"id":5},"after":{"id":6}}"#
        );
        assert_eq!(
            serde_json::to_string(&record.stored_form(true)).unwrap(),
            r#"{"table":"ord","action":"update","before":{"id":5},"after":{"id":6}}"#
        );
    }

    #[test]
    fn test_record_deserializes_from_output() {
        let value = json!({
            "table": "ord",
            "create_datetime": "1970-01-01T00:00:02.000Z",
            "action": "update",
            "before": {"id": 5},
            "after": {"id": 6}
        });
        let record: NormalizedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.action(), MutationKind::Update);
        assert_eq!(record.event_time().timestamp_millis(), 2000);
        assert_eq!(record.event_time_iso(), "1970-01-01T00:00:02.000Z");
    }
}
