//! Change event types and the pure stages of the capture pipeline.
//!
//! A raw frame from the change stream goes through:
//!
//! - [`decode_frame`]: text frame to [`ChangeEvent`], rejecting malformed payloads
//! - [`classify`]: insert/update/delete from the row images, partition-free table name
//! - [`normalize`]: canonical, comparable [`NormalizedRecord`]
//! - [`sort_records`]: deterministic `(table, action, event_time)` order
//!
//! None of these stages hold state, so the session layer can re-run any of
//! them and get the same answer.
//!
//! ```
//! use capture_types::{decode_frame, normalize, MutationKind};
//!
//! let frame = r#"{"after": {"Id": "5"}, "source": {"name": "oracle", "table": "ORD_P1"}, "ts_ms": 1000}"#;
//! let event = decode_frame(frame).unwrap();
//! let record = normalize(&event, false);
//!
//! assert_eq!(record.table(), "ord");
//! assert_eq!(record.action(), MutationKind::Insert);
//! assert_eq!(record.after().unwrap()["id"], 5);
//! ```

mod classify;
mod decode;
mod display;
mod error;
mod event;
mod normalize;
mod sort;

pub use classify::{classify, event_time, mutation_kind, strip_partition_suffix, Classification};
pub use decode::{decode_frame, decode_value};
pub use display::{display_line, display_lines};
pub use error::{CaptureError, DecodeError};
pub use event::{
    ChangeEvent, MutationKind, NormalizedRecord, RowImage, Source, SourceRecords, StoredRecord,
};
pub use normalize::{
    coerce_numeric, normalize, normalize_table_name, normalize_value, TIMESTAMP_COLUMNS,
};
pub use sort::{compare_records, sort_records};
