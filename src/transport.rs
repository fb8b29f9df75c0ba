//! Transport events feeding a capture session.
//!
//! A stream transport reports four things: the stream opened, a text frame
//! arrived, the stream failed, the stream closed. Instead of wiring callbacks
//! into the session, the transport pushes those as [`TransportEvent`]s onto a
//! channel that the session drains in order.

use tokio::sync::mpsc;
use tracing::debug;

/// Default capacity of the transport event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// One signal from the stream transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed, frames may follow
    Open,
    /// One decoded text frame
    Message(String),
    /// Stream-level failure; no further events follow
    Error(String),
    /// Normal close, including caller-initiated disconnect
    Close,
}

/// Sending side of a session's event channel.
///
/// Cloned freely: the transport holds one to report stream events and the
/// caller holds one to disconnect. Sending to a session that has already
/// finished is silently ignored, which makes [`TransportHandle::disconnect`]
/// idempotent.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<TransportEvent>,
}

/// Creates a transport event channel.
pub fn channel(capacity: usize) -> (TransportHandle, mpsc::Receiver<TransportEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (TransportHandle { tx }, rx)
}

impl TransportHandle {
    /// Delivers an event. Returns `false` once the session has stopped listening.
    pub async fn send(&self, event: TransportEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!("Session no longer listening, dropped {event:?}");
                false
            }
        }
    }

    pub async fn open(&self) -> bool {
        self.send(TransportEvent::Open).await
    }

    pub async fn message(&self, frame: impl Into<String>) -> bool {
        self.send(TransportEvent::Message(frame.into())).await
    }

    pub async fn error(&self, cause: impl Into<String>) -> bool {
        self.send(TransportEvent::Error(cause.into())).await
    }

    pub async fn close(&self) -> bool {
        self.send(TransportEvent::Close).await
    }

    /// Caller-initiated disconnect. Frames already queued ahead of it are
    /// still ingested; a no-op when the session has already closed.
    pub async fn disconnect(&self) {
        self.close().await;
    }

    /// True once the receiving session has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (handle, mut rx) = channel(8);
        assert!(handle.open().await);
        assert!(handle.message("a").await);
        assert!(handle.error("boom").await);

        assert_eq!(rx.recv().await, Some(TransportEvent::Open));
        assert_eq!(rx.recv().await, Some(TransportEvent::Message("a".to_string())));
        assert_eq!(rx.recv().await, Some(TransportEvent::Error("boom".to_string())));
    }

    #[tokio::test]
    async fn test_disconnect_after_receiver_dropped_is_a_no_op() {
        let (handle, rx) = channel(8);
        drop(rx);
        assert!(handle.is_closed());
        assert!(!handle.message("late").await);
        handle.disconnect().await;
        handle.disconnect().await;
    }
}
