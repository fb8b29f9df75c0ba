//! Capture session state machine
//!
//! ```text
//! Idle --connect()--> Connecting --Open--> Open --Close/Error--> Closed
//!                          |                                      ^
//!                          +-----------Close/Error----------------+
//! ```
//!
//! While `Open`, every frame is decoded, normalized and appended to the
//! session's buffer. Leaving `Open` finalizes the session exactly once:
//! both sequences are drained, sorted and handed to the sink. `Closed` is
//! terminal; a new capture needs a new session.

use capture_sink::{CaptureSink, StoreOptions, StoreReceipt};
use capture_types::{
    decode_frame, display_line, normalize, sort_records, CaptureError, NormalizedRecord, Source,
    SourceRecords,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::buffer::SessionBuffer;
use crate::transport::TransportEvent;

/// Lifecycle state of a [`CaptureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Open => write!(f, "Open"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Settings read once when a session is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Drop `create_datetime`/`update_datetime`/`delete_datetime` columns
    pub strip_timestamp_columns: bool,
    /// User whose changes the stream is filtered to (informational here;
    /// the transport applies the filter)
    pub target_user: Option<String>,
}

/// Frame counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames delivered while the session was open
    pub received: u64,
    /// Frames that made it into the buffer
    pub buffered: u64,
    /// Frames rejected by the decoder
    pub decode_failures: u64,
    /// Frames from a source other than oracle/postgres
    pub unknown_source: u64,
    /// Frames delivered outside the `Open` state
    pub out_of_state: u64,
}

/// Outcome of a finished session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// When the stream opened; `None` if it never did
    pub started_at: Option<DateTime<Utc>>,
    /// The ordered records handed to the sink, kept for retries
    pub records: SourceRecords,
    pub options: StoreOptions,
    /// Set when the session ended because of a stream failure
    pub transport_error: Option<CaptureError>,
    /// Result of the store-and-diff call; `None` when no hand-off happened
    pub store_result: Option<Result<StoreReceipt, CaptureError>>,
    pub stats: SessionStats,
}

impl SessionReport {
    /// True when the records were handed off and the sink accepted them.
    pub fn is_stored(&self) -> bool {
        matches!(self.store_result, Some(Ok(_)))
    }
}

/// One capture run over one stream connection.
pub struct CaptureSession<S: CaptureSink> {
    state: SessionState,
    buffer: Arc<SessionBuffer>,
    sink: Arc<S>,
    options: SessionOptions,
    started_at: Option<DateTime<Utc>>,
    stats: SessionStats,
    records: SourceRecords,
    transport_error: Option<CaptureError>,
    store_result: Option<Result<StoreReceipt, CaptureError>>,
}

impl<S: CaptureSink> CaptureSession<S> {
    /// Creates an idle session that will buffer into `buffer` and hand its
    /// records to `sink` when it closes.
    pub fn new(buffer: Arc<SessionBuffer>, sink: Arc<S>, options: SessionOptions) -> Self {
        Self {
            state: SessionState::Idle,
            buffer,
            sink,
            options,
            started_at: None,
            stats: SessionStats::default(),
            records: SourceRecords::default(),
            transport_error: None,
            store_result: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Shared buffer, for read-only live views.
    pub fn buffer(&self) -> &Arc<SessionBuffer> {
        &self.buffer
    }

    /// `Idle -> Connecting`. Clears whatever an earlier session left in the
    /// buffer. Returns `false` (and does nothing) in any other state.
    pub fn connect(&mut self) -> bool {
        if self.state != SessionState::Idle {
            warn!("Cannot connect a session in state {}", self.state);
            return false;
        }

        self.buffer.clear();
        self.state = SessionState::Connecting;
        match &self.options.target_user {
            Some(user) => info!("Connecting capture session for user {user}"),
            None => info!("Connecting capture session"),
        }
        true
    }

    /// Applies one transport event.
    pub async fn handle(&mut self, event: TransportEvent) {
        match (self.state, event) {
            (SessionState::Open, TransportEvent::Message(frame)) => self.ingest(&frame),
            (state, TransportEvent::Message(_)) => {
                self.stats.out_of_state += 1;
                warn!("Dropping frame received while {state}");
            }

            (SessionState::Connecting, TransportEvent::Open) => {
                let started_at = Utc::now();
                self.started_at = Some(started_at);
                self.state = SessionState::Open;
                info!("Capture session open at {}", started_at.to_rfc3339());
            }
            (state, TransportEvent::Open) => {
                warn!("Ignoring open signal while {state}");
            }

            (SessionState::Open, TransportEvent::Error(cause)) => {
                error!("Stream error: {cause}");
                self.transport_error = Some(CaptureError::Transport(cause));
                self.close().await;
            }
            (SessionState::Open, TransportEvent::Close) => {
                info!("Stream closed");
                self.close().await;
            }

            (SessionState::Connecting, TransportEvent::Error(cause)) => {
                error!("Stream failed before opening: {cause}");
                self.transport_error = Some(CaptureError::Transport(cause));
                self.state = SessionState::Closed;
            }
            (SessionState::Connecting, TransportEvent::Close) => {
                info!("Stream closed before opening");
                self.state = SessionState::Closed;
            }

            (state, signal @ (TransportEvent::Error(_) | TransportEvent::Close)) => {
                debug!("Ignoring {signal:?} while {state}");
            }
        }
    }

    /// Drives the session from a transport event channel until it closes.
    ///
    /// An idle session is connected first. If every sender is dropped before
    /// a close arrives, that counts as a normal close.
    pub async fn run(mut self, mut events: mpsc::Receiver<TransportEvent>) -> SessionReport {
        if self.state == SessionState::Idle {
            self.connect();
        }

        while self.state != SessionState::Closed {
            match events.recv().await {
                Some(event) => self.handle(event).await,
                None => {
                    debug!("Transport channel dropped");
                    self.handle(TransportEvent::Close).await;
                    // Dropped while idle: nothing left to wait for.
                    self.state = SessionState::Closed;
                }
            }
        }

        self.into_report()
    }

    /// Consumes the session and returns what it produced.
    pub fn into_report(self) -> SessionReport {
        SessionReport {
            started_at: self.started_at,
            records: self.records,
            options: StoreOptions {
                timestamp_columns_stripped: self.options.strip_timestamp_columns,
            },
            transport_error: self.transport_error,
            store_result: self.store_result,
            stats: self.stats,
        }
    }

    fn ingest(&mut self, frame: &str) {
        self.stats.received += 1;

        let event = match decode_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!("Dropping malformed frame: {e}");
                return;
            }
        };

        let source = match event.source_name.parse::<Source>() {
            Ok(source) => source,
            Err(e) => {
                self.stats.unknown_source += 1;
                warn!("Dropping frame for table {}: {e}", event.table);
                return;
            }
        };

        let record = normalize(&event, self.options.strip_timestamp_columns);
        debug!("{source}: {}", display_line(&record));
        self.buffer.append(source, record);
        self.stats.buffered += 1;
    }

    /// `Open -> Closed` plus finalize. Runs at most once per session.
    async fn close(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        self.state = SessionState::Closed;
        self.finalize().await;
    }

    async fn finalize(&mut self) {
        let strip = self.options.strip_timestamp_columns;
        let snapshot = self.buffer.snapshot_and_clear();

        let prepare = |records: Vec<NormalizedRecord>| -> Vec<NormalizedRecord> {
            let sorted = sort_records(records);
            if strip {
                sorted.iter().map(|r| r.renormalize(true)).collect()
            } else {
                sorted
            }
        };
        self.records = SourceRecords {
            oracle: prepare(snapshot.oracle),
            postgres: prepare(snapshot.postgres),
        };

        let started_at = self.started_at.unwrap_or_else(Utc::now);
        let options = StoreOptions {
            timestamp_columns_stripped: strip,
        };
        info!(
            "Finalizing session {}: {} oracle, {} postgres records",
            started_at.to_rfc3339(),
            self.records.oracle.len(),
            self.records.postgres.len()
        );

        let result = self
            .sink
            .store_and_diff(
                started_at,
                &self.records.oracle,
                &self.records.postgres,
                &options,
            )
            .await;

        self.store_result = Some(match result {
            Ok(receipt) => {
                info!("Stored session {}", started_at.to_rfc3339());
                Ok(receipt)
            }
            Err(e) => {
                error!("Failed to store session {}: {e:#}", started_at.to_rfc3339());
                Err(CaptureError::Sink(format!("{e:#}")))
            }
        });
    }
}
