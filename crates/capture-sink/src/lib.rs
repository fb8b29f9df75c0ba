//! Store-and-diff sink abstraction.
//!
//! This crate defines the `CaptureSink` trait a finished capture session
//! hands its two ordered record sets to. Session code is generic over the
//! sink so tests can record calls in memory while the CLI writes files.
//!
//! ## Implementations
//!
//! - `FilesystemSink` - JSON files per source, optional external diff tool
//! - `NullSink` - discards everything (dry runs)

mod filesystem;
mod traits;

pub use filesystem::{expand_env_vars, session_file_stem, FilesystemSink};
pub use traits::{CaptureSink, NullSink, StoreOptions, StoreReceipt};
