//! CaptureSink trait definition.

use anyhow::Result;
use capture_types::NormalizedRecord;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// How the records handed to a sink were prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// `create_datetime`/`update_datetime`/`delete_datetime` were removed
    /// from the row images (and the record's own `create_datetime` should be
    /// left out of the stored form).
    pub timestamp_columns_stripped: bool,
}

/// What a sink did with one session's records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReceipt {
    /// Files or other artifacts written, oracle side first.
    pub artifacts: Vec<PathBuf>,
    /// Whether an external diff tool was started on the artifacts.
    pub diff_tool_launched: bool,
}

/// Trait for persisting and comparing a finalized capture session.
///
/// A session calls [`CaptureSink::store_and_diff`] at most once, after it has
/// closed. The outcome is reported back to the caller but never changes the
/// session's state, so a failed store can be retried from the records kept in
/// the session report.
///
/// ```ignore
/// let receipt = sink
///     .store_and_diff(started_at, &records.oracle, &records.postgres, &options)
///     .await?;
/// ```
#[async_trait::async_trait]
pub trait CaptureSink: Send + Sync {
    /// Store both ordered record sets, keyed by the session start time, and
    /// start a comparison of them if the sink is configured to.
    async fn store_and_diff(
        &self,
        started_at: DateTime<Utc>,
        oracle: &[NormalizedRecord],
        postgres: &[NormalizedRecord],
        options: &StoreOptions,
    ) -> Result<StoreReceipt>;
}

/// Sink that drops everything. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl CaptureSink for NullSink {
    async fn store_and_diff(
        &self,
        started_at: DateTime<Utc>,
        oracle: &[NormalizedRecord],
        postgres: &[NormalizedRecord],
        _options: &StoreOptions,
    ) -> Result<StoreReceipt> {
        tracing::info!(
            "Dry run: discarding session {} ({} oracle, {} postgres records)",
            started_at.to_rfc3339(),
            oracle.len(),
            postgres.len()
        );
        Ok(StoreReceipt::default())
    }
}
