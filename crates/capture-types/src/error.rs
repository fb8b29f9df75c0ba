//! Error types for the capture pipeline.

use thiserror::Error;

/// Reasons a raw frame is rejected by [`crate::decode_frame`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Frame must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Frame carries neither a 'before' nor an 'after' row image")]
    NoRowImage,
}

/// Errors surfaced by a capture session.
///
/// None of these are fatal to the process. A decode error only costs the
/// frame it came from, a transport error ends the session but its buffered
/// records are still flushed, and a sink error leaves the ordered records in
/// the session report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store and diff failed: {0}")]
    Sink(String),
}

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
