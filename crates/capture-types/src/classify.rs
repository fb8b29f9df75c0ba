//! Mutation classification and table name canonicalization

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::event::{ChangeEvent, MutationKind, RowImage};

/// Trailing physical partition marker, e.g. `_p3` or `_P12_3`.
fn partition_suffix_re() -> &'static Regex {
    static PARTITION_SUFFIX_RE: OnceLock<Regex> = OnceLock::new();
    PARTITION_SUFFIX_RE
        .get_or_init(|| Regex::new(r"(?i)_p\d+(_\d+)?$").expect("valid partition suffix regex"))
}

/// Strips a trailing partition marker from a raw table name.
///
/// Casing is left alone; see [`crate::normalize_table_name`] for the fully
/// canonical form.
pub fn strip_partition_suffix(table: &str) -> &str {
    match partition_suffix_re().find(table) {
        Some(m) => &table[..m.start()],
        None => table,
    }
}

/// Result of classifying a single change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: MutationKind,
    pub table: String,
    pub event_time: DateTime<Utc>,
}

/// Derives the mutation kind from the row images alone.
///
/// - both images non-empty: update
/// - no (or empty) before image and a non-empty after image: insert
/// - anything else: delete
pub fn mutation_kind(before: Option<&RowImage>, after: Option<&RowImage>) -> MutationKind {
    let has_before = before.is_some_and(|m| !m.is_empty());
    let has_after = after.is_some_and(|m| !m.is_empty());

    match (has_before, has_after) {
        (true, true) => MutationKind::Update,
        (false, true) => MutationKind::Insert,
        _ => MutationKind::Delete,
    }
}

/// Converts a millisecond timestamp to a UTC instant.
///
/// Out-of-range values map to the Unix epoch so that a bad clock on one
/// event cannot take the session down.
pub fn event_time(timestamp_millis: i64) -> DateTime<Utc> {
    match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(dt) => dt,
        None => {
            warn!("Timestamp {timestamp_millis}ms is out of range, using the Unix epoch");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

/// Classifies an event: mutation kind, partition-free table name and event time.
///
/// An explicit `op` field never overrides the derived kind, since not every
/// source encodes it the same way.
pub fn classify(event: &ChangeEvent) -> Classification {
    let kind = mutation_kind(event.before.as_ref(), event.after.as_ref());

    if let Some(op) = event.op.as_deref() {
        if !op_agrees(op, kind) {
            debug!(
                "Event op '{op}' on {} disagrees with derived kind '{kind}', keeping '{kind}'",
                event.table
            );
        }
    }

    Classification {
        kind,
        table: strip_partition_suffix(&event.table).to_string(),
        event_time: event_time(event.timestamp_millis),
    }
}

fn op_agrees(op: &str, kind: MutationKind) -> bool {
    match op.to_ascii_lowercase().as_str() {
        "c" | "r" | "i" | "insert" | "create" => kind == MutationKind::Insert,
        "u" | "update" => kind == MutationKind::Update,
        "d" | "delete" => kind == MutationKind::Delete,
        _ => false,
    }
}
