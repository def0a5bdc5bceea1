//! Transport seam: what the coordinator needs from an HTTP/2 stack.
//!
//! The coordinator never frames or multiplexes anything itself. A transport
//! opens push streams, a push stream accepts body bytes, and both report
//! lifecycle events through a `StreamEvents` channel.
//!
//! Contract for implementors: keep at least one `StreamEventSender` alive for
//! as long as the stream is usable. A closed event channel reads as `Close`.

use std::future::Future;

use bytes::Bytes;
use http::HeaderMap;
use tokio::sync::{mpsc, watch};

use h2push_core::Priority;

use crate::error::StreamError;

/// RST_STREAM error code a peer sends when it declines a push.
pub const RESET_CANCEL: u32 = 0x8;

/// Opens push streams on one connection.
pub trait PushTransport {
    type Stream: PushStream;

    /// Request a push stream. Headers are final: content-encoding and
    /// content-length have already been decided.
    fn push_stream(
        &self,
        path: &str,
        headers: &HeaderMap,
        priority: Priority,
    ) -> Result<(Self::Stream, StreamEvents), StreamError>;
}

/// The writable half of a push stream.
///
/// `write` resolves once the transport can take more data; that is the only
/// backpressure signal the coordinator relies on.
pub trait PushStream: Send + 'static {
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), StreamError>> + Send;

    /// Write an optional final chunk and half-close the stream.
    fn end(&mut self, last: Option<Bytes>)
        -> impl Future<Output = Result<(), StreamError>> + Send;

    /// Abandon the stream. Must be idempotent.
    fn destroy(&mut self);

    fn is_writable(&self) -> bool;
}

// ── Stream events ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum StreamEvent {
    /// The peer accepted the push; body bytes may flow.
    Acknowledge,
    Error(StreamError),
    Close,
    Finish,
}

/// Receiving side of a push stream's events. Owned by exactly one push.
#[derive(Debug)]
pub struct StreamEvents {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl StreamEvents {
    pub fn channel() -> (StreamEventSender, StreamEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StreamEventSender { tx }, StreamEvents { rx })
    }

    /// Next event. Once every sender is gone this keeps returning `Close`.
    pub async fn recv(&mut self) -> StreamEvent {
        self.rx.recv().await.unwrap_or(StreamEvent::Close)
    }

    /// Non-blocking poll used between body chunks.
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(StreamEvent::Close),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamEventSender {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl StreamEventSender {
    /// Returns false if the push already went away.
    pub fn emit(&self, event: StreamEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn acknowledge(&self) -> bool {
        self.emit(StreamEvent::Acknowledge)
    }

    pub fn error(&self, err: StreamError) -> bool {
        self.emit(StreamEvent::Error(err))
    }

    pub fn close(&self) -> bool {
        self.emit(StreamEvent::Close)
    }

    pub fn finish(&self) -> bool {
        self.emit(StreamEvent::Finish)
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

/// Owner side of a connection's close signal. Held by whatever drives the
/// socket; dropping it counts as a close.
#[derive(Debug)]
pub struct Connection {
    tx: watch::Sender<bool>,
}

impl Connection {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn watch(&self) -> ConnectionWatch {
        ConnectionWatch {
            rx: self.tx.subscribe(),
        }
    }

    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a connection, shared by every push on it.
#[derive(Debug, Clone)]
pub struct ConnectionWatch {
    rx: watch::Receiver<bool>,
}

impl ConnectionWatch {
    /// Resolves once the connection is closed or its owner is gone.
    pub async fn closed(&mut self) {
        let _ = self.rx.wait_for(|closed| *closed).await.map(|_| ());
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}
