//! One-line summaries of buffered records for a live view.

use chrono::Local;

use crate::event::NormalizedRecord;
use crate::sort::sort_records;

/// Renders `"<local time> | <TABLE> | <ACTION>"`.
pub fn display_line(record: &NormalizedRecord) -> String {
    format!(
        "{} | {} | {}",
        record
            .event_time()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S"),
        record.table().to_uppercase(),
        record.action().as_str().to_uppercase()
    )
}

/// Summary lines in the same order the records will be stored in.
pub fn display_lines(records: &[NormalizedRecord]) -> Vec<String> {
    sort_records(records.to_vec())
        .iter()
        .map(display_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeEvent, NormalizedRecord};
    use crate::normalize::normalize;
    use serde_json::{json, Map};

    fn record(table: &str, after: serde_json::Value, before: Option<serde_json::Value>, ts: i64) -> NormalizedRecord {
        normalize(
            &ChangeEvent {
                source_name: "postgres".to_string(),
                table: table.to_string(),
                before: before.and_then(|v| v.as_object().cloned()),
                after: after.as_object().cloned(),
                timestamp_millis: ts,
                op: None,
                extra: Map::new(),
            },
            false,
        )
    }

    #[test]
    fn test_display_line_format() {
        let line = display_line(&record("ord_p2", json!({"id": 1}), None, 0));
        let parts: Vec<_> = line.split(" | ").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), "1970-01-01 00:00:00".len());
        assert_eq!(parts[1], "ORD");
        assert_eq!(parts[2], "INSERT");
    }

    #[test]
    fn test_display_lines_are_sorted() {
        let records = vec![
            record("b", json!({"id": 2}), Some(json!({"id": 1})), 10),
            record("a", json!({"id": 1}), None, 20),
        ];
        let lines = display_lines(&records);
        assert!(lines[0].ends_with("| A | INSERT"));
        assert!(lines[1].ends_with("| B | UPDATE"));
    }
}
