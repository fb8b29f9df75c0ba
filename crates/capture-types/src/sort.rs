//! Deterministic record ordering
//!
//! Each source's records are ordered by `(table, action, event_time)` so two
//! independently captured logs line up regardless of arrival order.
//!
//! `action` is compared as its literal name (`delete` < `insert` < `update`),
//! not by any logical ordering of the kinds. Historical capture files were
//! produced this way and must keep diffing cleanly against new ones.

use std::cmp::Ordering;

use crate::event::NormalizedRecord;

/// Compares two records by table, then action name, then event time.
pub fn compare_records(a: &NormalizedRecord, b: &NormalizedRecord) -> Ordering {
    a.table
        .as_bytes()
        .cmp(b.table.as_bytes())
        .then_with(|| a.action.as_str().cmp(b.action.as_str()))
        .then_with(|| a.event_time.cmp(&b.event_time))
}

/// Returns the records in deterministic order.
///
/// The sort is stable: records with equal keys keep their arrival order.
pub fn sort_records(mut records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    records.sort_by(compare_records);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MutationKind, RowImage};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn record(table: &str, action: MutationKind, ts: i64, marker: i64) -> NormalizedRecord {
        let image: RowImage = json!({"marker": marker}).as_object().cloned().unwrap();
        NormalizedRecord {
            table: table.to_string(),
            event_time: Utc.timestamp_millis_opt(ts).unwrap(),
            action,
            before: None,
            after: Some(image),
        }
    }

    fn keys(records: &[NormalizedRecord]) -> Vec<(String, &'static str, i64)> {
        records
            .iter()
            .map(|r| {
                (
                    r.table().to_string(),
                    r.action().as_str(),
                    r.event_time().timestamp_millis(),
                )
            })
            .collect()
    }

    #[test]
    fn test_sort_keys() {
        let input = vec![
            record("orders", MutationKind::Update, 3000, 1),
            record("items", MutationKind::Insert, 5000, 2),
            record("orders", MutationKind::Insert, 4000, 3),
            record("orders", MutationKind::Delete, 1000, 4),
            record("orders", MutationKind::Insert, 2000, 5),
        ];

        let sorted = sort_records(input);
        assert_eq!(
            keys(&sorted),
            vec![
                ("items".to_string(), "insert", 5000),
                ("orders".to_string(), "delete", 1000),
                ("orders".to_string(), "insert", 2000),
                ("orders".to_string(), "insert", 4000),
                ("orders".to_string(), "update", 3000),
            ]
        );
    }

    #[test]
    fn test_action_sorts_as_string_not_by_kind() {
        let sorted = sort_records(vec![
            record("t", MutationKind::Insert, 1, 0),
            record("t", MutationKind::Update, 1, 0),
            record("t", MutationKind::Delete, 1, 0),
        ]);
        let actions: Vec<_> = sorted.iter().map(|r| r.action().as_str()).collect();
        assert_eq!(actions, vec!["delete", "insert", "update"]);
    }

    #[test]
    fn test_table_sort_is_bytewise() {
        let sorted = sort_records(vec![
            record("b", MutationKind::Insert, 1, 0),
            record("_a", MutationKind::Insert, 1, 0),
            record("a", MutationKind::Insert, 1, 0),
        ]);
        let tables: Vec<_> = sorted.iter().map(|r| r.table().to_string()).collect();
        assert_eq!(tables, vec!["_a", "a", "b"]);
    }

    #[test]
    fn test_equal_keys_keep_arrival_order() {
        let input: Vec<_> = (0..5)
            .map(|marker| record("t", MutationKind::Insert, 1000, marker))
            .collect();

        let sorted = sort_records(input.clone());
        assert_eq!(sorted, input);
    }

    #[test]
    fn test_sort_is_reproducible() {
        let input = vec![
            record("z", MutationKind::Delete, 9, 1),
            record("a", MutationKind::Update, 2, 2),
            record("a", MutationKind::Update, 1, 3),
            record("m", MutationKind::Insert, 5, 4),
        ];

        let first = sort_records(input.clone());
        let second = sort_records(input);
        assert_eq!(first, second);
        assert_eq!(sort_records(first.clone()), first);
    }
}
