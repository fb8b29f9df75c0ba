//! Replay transport: newline-delimited frames from a file or stdin.
//!
//! Each non-blank line is one text frame. The transport reports `Open` once
//! the input is readable, one `Message` per line, then `Close` at end of
//! input or `Error` if reading fails.

use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::transport::TransportHandle;

/// Where replayed frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaySource {
    File(PathBuf),
    Stdin,
}

impl ReplaySource {
    /// `-` means stdin, anything else is a file path.
    pub fn parse(input: &str) -> Self {
        if input == "-" {
            ReplaySource::Stdin
        } else {
            ReplaySource::File(PathBuf::from(input))
        }
    }

    /// True when frames come from stdin. A pending stdin read runs on a
    /// blocking thread that cannot be cancelled, so the runtime cannot wait
    /// for it to finish on shutdown.
    pub fn reads_stdin(&self) -> bool {
        matches!(self, ReplaySource::Stdin)
    }
}

/// Feeds every line of `reader` to the session behind `handle`.
///
/// Returns the number of frames delivered. Stops early if the session stops
/// listening (for example after a caller-initiated disconnect).
pub async fn replay_frames<R>(reader: R, handle: &TransportHandle) -> usize
where
    R: AsyncBufRead + Unpin,
{
    if !handle.open().await {
        return 0;
    }

    let mut lines = reader.lines();
    let mut delivered = 0;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !handle.message(line).await {
                    debug!("Session stopped listening after {delivered} frames");
                    return delivered;
                }
                delivered += 1;
            }
            Ok(None) => {
                handle.close().await;
                return delivered;
            }
            Err(e) => {
                handle.error(format!("Failed to read frame: {e}")).await;
                return delivered;
            }
        }
    }
}

/// Spawns a task replaying `source` into the session behind `handle`.
pub fn spawn_replay(source: ReplaySource, handle: TransportHandle) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let delivered = match &source {
            ReplaySource::Stdin => {
                replay_frames(BufReader::new(tokio::io::stdin()), &handle).await
            }
            ReplaySource::File(path) => match tokio::fs::File::open(path).await {
                Ok(file) => replay_frames(BufReader::new(file), &handle).await,
                Err(e) => {
                    handle
                        .error(format!("Failed to open {}: {e}", path.display()))
                        .await;
                    0
                }
            },
        };
        info!("Replayed {delivered} frames from {source:?}");
        delivered
    })
}
