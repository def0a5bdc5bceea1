//! In-memory transport with push streams backed by channels.
//!
//! The server half (`MemoryTransport`) implements `PushTransport`; the peer
//! half (`MemoryPeer`) receives one `PushedStream` per push and plays the
//! client: acknowledge, reset, read the body. Body chunks travel through a
//! bounded channel, so a peer that stops reading stalls the writer.

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use tokio::sync::mpsc;

use h2push_core::Priority;

use crate::error::StreamError;
use crate::transport::{
    PushStream, PushTransport, StreamEventSender, StreamEvents, RESET_CANCEL,
};

/// Server half.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    pushes: mpsc::UnboundedSender<PushedStream>,
    buffer: usize,
}

/// Client half.
#[derive(Debug)]
pub struct MemoryPeer {
    pushes: mpsc::UnboundedReceiver<PushedStream>,
}

impl MemoryTransport {
    /// `buffer` is the number of body chunks in flight per stream.
    pub fn pair(buffer: usize) -> (MemoryTransport, MemoryPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                pushes: tx,
                buffer: buffer.max(1),
            },
            MemoryPeer { pushes: rx },
        )
    }
}

impl PushTransport for MemoryTransport {
    type Stream = MemoryPushStream;

    fn push_stream(
        &self,
        path: &str,
        headers: &HeaderMap,
        priority: Priority,
    ) -> Result<(MemoryPushStream, StreamEvents), StreamError> {
        let (events_tx, events) = StreamEvents::channel();
        let (data_tx, data_rx) = mpsc::channel(self.buffer);

        let pushed = PushedStream {
            path: path.to_string(),
            headers: headers.clone(),
            priority,
            data: data_rx,
            events: events_tx.clone(),
        };
        self.pushes.send(pushed).map_err(|_| StreamError::Closed)?;

        let stream = MemoryPushStream {
            data: Some(data_tx),
            events: events_tx,
            ended: false,
        };
        Ok((stream, events))
    }
}

impl MemoryPeer {
    /// Next push promise, or `None` once the transport is dropped.
    pub async fn next_push(&mut self) -> Option<PushedStream> {
        self.pushes.recv().await
    }
}

// ── Server-side stream ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MemoryPushStream {
    data: Option<mpsc::Sender<Bytes>>,
    events: StreamEventSender,
    ended: bool,
}

impl PushStream for MemoryPushStream {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StreamError> {
        if self.ended {
            return Err(StreamError::WriteAfterEnd);
        }
        let tx = self.data.as_ref().ok_or(StreamError::WriteAfterEnd)?;
        tx.send(chunk)
            .await
            .map_err(|_| StreamError::Reset(RESET_CANCEL))
    }

    async fn end(&mut self, last: Option<Bytes>) -> Result<(), StreamError> {
        if self.ended {
            return Err(StreamError::WriteAfterEnd);
        }
        if let Some(chunk) = last.filter(|c| !c.is_empty()) {
            self.write(chunk).await?;
        }
        self.ended = true;
        self.data = None;
        self.events.finish();
        Ok(())
    }

    fn destroy(&mut self) {
        self.ended = true;
        if self.data.take().is_some() {
            self.events.close();
        }
    }

    fn is_writable(&self) -> bool {
        !self.ended && self.data.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

// ── Peer-side stream ──────────────────────────────────────────────────────────

/// A push as the client sees it.
#[derive(Debug)]
pub struct PushedStream {
    pub path: String,
    pub headers: HeaderMap,
    pub priority: Priority,
    data: mpsc::Receiver<Bytes>,
    events: StreamEventSender,
}

impl PushedStream {
    pub fn acknowledge(&self) {
        self.events.acknowledge();
    }

    /// Cancel the push the way a browser does (RST_STREAM CANCEL).
    pub fn reset(&mut self) {
        self.events.error(StreamError::Reset(RESET_CANCEL));
        self.data.close();
    }

    /// Report an arbitrary stream error to the pushing side.
    pub fn fail(&self, err: StreamError) {
        self.events.error(err);
    }

    pub fn close(&mut self) {
        self.events.close();
        self.data.close();
    }

    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.data.recv().await
    }

    /// Everything until the server ends (or drops) the stream.
    pub async fn read_body(&mut self) -> Bytes {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.data.recv().await {
            body.extend_from_slice(&chunk);
        }
        body.freeze()
    }
}

/// A peer that forgets a push closes it.
impl Drop for PushedStream {
    fn drop(&mut self) {
        self.events.close();
    }
}
