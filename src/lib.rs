//! capture-diff library
//!
//! Captures a live change stream fed by two database engines (an Oracle-side
//! and a PostgreSQL-side replicator), normalizes both engines' row-change
//! events into one canonical record format, and writes two deterministically
//! ordered captures that a diff tool can compare byte for byte.
//!
//! # Pipeline
//!
//! ```text
//! raw frame -> decode -> classify -> normalize -> SessionBuffer (per source)
//!           -> (on close) sort -> CaptureSink::store_and_diff
//! ```
//!
//! The pure stages live in `capture_types`, the sink abstraction in
//! `capture_sink`. This crate owns the stateful parts: the per-source
//! [`SessionBuffer`] and the [`CaptureSession`] state machine, driven by
//! [`TransportEvent`]s pushed onto a channel.
//!
//! # CLI Usage
//!
//! ```bash
//! # Replay captured frames and write both sides under ./work/data
//! capture-diff capture --input frames.jsonl --work-dir ./work
//!
//! # Read frames from stdin, open the result in a diff tool
//! capture-diff capture --input - --work-dir ./work --diff-tool meld --open-diff-tool
//!
//! # Normalize a single frame and print the canonical record
//! capture-diff normalize '{"after": {"Id": "5"}, "source": {"name": "oracle", "table": "ORD_P1"}, "ts_ms": 1000}'
//! ```

pub mod buffer;
pub mod config;
pub mod replay;
pub mod session;
pub mod testing;
pub mod transport;

pub use buffer::SessionBuffer;
pub use config::{CaptureOpts, Settings};
pub use replay::{replay_frames, spawn_replay, ReplaySource};
pub use session::{CaptureSession, SessionOptions, SessionReport, SessionState, SessionStats};
pub use transport::{channel, TransportEvent, TransportHandle, DEFAULT_CHANNEL_CAPACITY};

// Re-export the pipeline and sink crates for convenience
pub use capture_sink as sink;
pub use capture_types as types;
