//! Per-source record buffer for a capture session.

use capture_types::{NormalizedRecord, Source, SourceRecords};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only accumulation of normalized records, one sequence per source.
///
/// Each source has its own lock, so ingestion for one source never waits on
/// a live-view read of the other. Critical sections are a push or a clone and
/// are never held across an await point.
#[derive(Debug, Default)]
pub struct SessionBuffer {
    oracle: Mutex<Vec<NormalizedRecord>>,
    postgres: Mutex<Vec<NormalizedRecord>>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, source: Source) -> MutexGuard<'_, Vec<NormalizedRecord>> {
        let slot = match source {
            Source::Oracle => &self.oracle,
            Source::Postgres => &self.postgres,
        };
        // A panic while holding the lock cannot leave a half-pushed record
        // behind, so a poisoned buffer is still consistent.
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record to the sequence of `source`.
    pub fn append(&self, source: Source, record: NormalizedRecord) {
        self.slot(source).push(record);
    }

    /// Copy of everything appended for `source` so far, in arrival order.
    pub fn peek(&self, source: Source) -> Vec<NormalizedRecord> {
        self.slot(source).clone()
    }

    pub fn len(&self, source: Source) -> usize {
        self.slot(source).len()
    }

    pub fn is_empty(&self) -> bool {
        Source::ALL.iter().all(|s| self.slot(*s).is_empty())
    }

    /// Takes both sequences and leaves the buffer empty.
    ///
    /// Both locks are held together (oracle, then postgres) so the snapshot
    /// is a single point in time with respect to appends.
    pub fn snapshot_and_clear(&self) -> SourceRecords {
        let mut oracle = self.slot(Source::Oracle);
        let mut postgres = self.slot(Source::Postgres);
        SourceRecords {
            oracle: std::mem::take(&mut *oracle),
            postgres: std::mem::take(&mut *postgres),
        }
    }

    /// Discards everything buffered.
    pub fn clear(&self) {
        let cleared = self.snapshot_and_clear();
        if !cleared.is_empty() {
            tracing::debug!("Cleared {} buffered records", cleared.total());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_types::{decode_frame, normalize};
    use std::sync::Arc;

    fn record(source: &str, id: i64) -> NormalizedRecord {
        let frame = format!(
            r#"{{"after": {{"id": {id}}}, "source": {{"name": "{source}", "table": "t"}}, "ts_ms": {id}}}"#
        );
        normalize(&decode_frame(&frame).unwrap(), false)
    }

    #[test]
    fn test_append_and_peek_per_source() {
        let buffer = SessionBuffer::new();
        assert!(buffer.is_empty());

        buffer.append(Source::Oracle, record("oracle", 1));
        buffer.append(Source::Oracle, record("oracle", 2));
        buffer.append(Source::Postgres, record("postgres", 3));

        assert_eq!(buffer.len(Source::Oracle), 2);
        assert_eq!(buffer.len(Source::Postgres), 1);
        assert_eq!(
            buffer.peek(Source::Oracle),
            vec![record("oracle", 1), record("oracle", 2)]
        );

        // Peeking is read-only.
        assert_eq!(buffer.len(Source::Oracle), 2);
    }

    #[test]
    fn test_snapshot_and_clear() {
        let buffer = SessionBuffer::new();
        buffer.append(Source::Oracle, record("oracle", 1));
        buffer.append(Source::Postgres, record("postgres", 2));

        let snapshot = buffer.snapshot_and_clear();
        assert_eq!(snapshot.oracle, vec![record("oracle", 1)]);
        assert_eq!(snapshot.postgres, vec![record("postgres", 2)]);
        assert!(buffer.is_empty());
        assert!(buffer.snapshot_and_clear().is_empty());
    }

    #[test]
    fn test_clear() {
        let buffer = SessionBuffer::new();
        buffer.append(Source::Postgres, record("postgres", 1));
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_all_kept_in_order() {
        let buffer = Arc::new(SessionBuffer::new());

        let writers: Vec<_> = Source::ALL
            .into_iter()
            .map(|source| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        buffer.append(source, record(source.as_str(), i));
                    }
                })
            })
            .collect();

        let reader = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let seen = buffer.peek(Source::Oracle);
                    for (i, r) in seen.iter().enumerate() {
                        assert_eq!(r.event_time().timestamp_millis(), i as i64);
                    }
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        let snapshot = buffer.snapshot_and_clear();
        assert_eq!(snapshot.oracle.len(), 200);
        assert_eq!(snapshot.postgres.len(), 200);
        assert!(snapshot
            .postgres
            .iter()
            .enumerate()
            .all(|(i, r)| r.event_time().timestamp_millis() == i as i64));
    }
}
