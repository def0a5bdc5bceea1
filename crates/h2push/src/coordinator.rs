//! Push coordinator. Decides compression, opens the push stream, then drives
//! one push from acknowledgment through body delivery to teardown.
//!
//! Each push runs in its own task and owns its stream, event receiver,
//! connection watch and body source. Whatever ends the push (finish, error,
//! reset, close, connection close) goes through the same teardown, which
//! releases the source once and reports at most one error.

use std::future::Future;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use tokio::sync::oneshot;

use h2push_core::{content_type, PushConfig};

use crate::compress::{self, ContentFilter, GzipChunker};
use crate::error::{ErrorReporter, ErrorSink, StreamError};
use crate::lifecycle::{Lifecycle, PushState};
use crate::plan::{self, PushPlan};
use crate::request::{PushBody, PushRequest};
use crate::source::BodySource;
use crate::transport::{ConnectionWatch, PushStream, PushTransport, StreamEvent, StreamEvents};

/// What a request handler hands to `push`: the session that can open push
/// streams, the connection it runs on, and where errors go.
pub struct PushContext<T> {
    pub transport: T,
    pub connection: ConnectionWatch,
    pub errors: ErrorSink,
}

impl<T> PushContext<T> {
    pub fn new(transport: T, connection: ConnectionWatch, errors: ErrorSink) -> Self {
        Self {
            transport,
            connection,
            errors,
        }
    }
}

/// Issues pushes with a fixed configuration and compressible filter.
#[derive(Clone)]
pub struct PushCoordinator {
    config: Arc<PushConfig>,
    filter: ContentFilter,
}

impl Default for PushCoordinator {
    fn default() -> Self {
        Self::new(PushConfig::default())
    }
}

impl PushCoordinator {
    pub fn new(config: PushConfig) -> Self {
        Self::with_filter(config, compress::default_filter())
    }

    pub fn with_filter(config: PushConfig, filter: ContentFilter) -> Self {
        Self {
            config: Arc::new(config),
            filter,
        }
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Finalize a request's headers: infer a content-type, resolve the
    /// length, decide on compression.
    pub async fn plan(&self, request: PushRequest) -> PushPlan {
        let PushRequest {
            path,
            mut headers,
            priority,
            body,
        } = request;
        let priority = priority.unwrap_or(self.config.push.default_priority);

        if self.config.push.infer_content_type && !headers.contains_key(CONTENT_TYPE) {
            if let Some(value) = content_type::infer_from_path(&path)
                .and_then(|ct| HeaderValue::from_str(&ct).ok())
            {
                headers.insert(CONTENT_TYPE, value);
            }
        }

        let length =
            plan::resolve_length(&body, &headers, self.config.files.stat_for_length).await;
        let compress = plan::should_compress(
            &body,
            length,
            &headers,
            self.config.compression.threshold.bytes(),
            &self.filter,
        );
        plan::apply_decision(&mut headers, compress, length);

        PushPlan {
            path,
            headers,
            priority,
            body,
            compress,
            length,
        }
    }

    /// Push a resource. Returns once the transport has opened (or refused)
    /// the stream; delivery continues in the background. Failures never
    /// surface here, only through the context's error sink and the handle.
    pub async fn push<T: PushTransport>(
        &self,
        ctx: &PushContext<T>,
        request: PushRequest,
    ) -> PushHandle<T::Stream> {
        let PushPlan {
            path,
            headers,
            priority,
            body,
            compress,
            length,
        } = self.plan(request).await;

        let mut reporter = ErrorReporter::new(ctx.errors.clone(), &path);
        let (done_tx, done_rx) = oneshot::channel();

        match ctx.transport.push_stream(&path, &headers, priority) {
            Ok((stream, events)) => {
                tracing::debug!(
                    path = %path,
                    %priority,
                    compress,
                    length,
                    body = body.kind(),
                    "push stream opened"
                );
                let active = ActivePush {
                    stream,
                    events,
                    connection: ctx.connection.clone(),
                    lifecycle: Lifecycle::new(),
                    reporter,
                    body,
                    compress,
                    level: self.config.compression.level.min(9),
                    chunk_size: self.config.compression.chunk_size.max(1),
                    written: 0,
                };
                tokio::spawn(active.run(done_tx));
            }
            Err(e) => {
                let state = if e.is_benign() {
                    PushState::Closed
                } else {
                    PushState::Errored
                };
                reporter.open(e);
                let _ = done_tx.send(PushOutcome {
                    state,
                    stream: None,
                    bytes_written: 0,
                });
            }
        }

        PushHandle {
            path,
            headers,
            compressed: compress,
            done: done_rx,
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Returned by `push`. Dropping it does not cancel the push.
#[derive(Debug)]
pub struct PushHandle<S> {
    path: String,
    headers: HeaderMap,
    compressed: bool,
    done: oneshot::Receiver<PushOutcome<S>>,
}

/// How a push ended. `stream` is the transport's stream in its terminal
/// state, absent when the transport refused to open one.
#[derive(Debug)]
pub struct PushOutcome<S> {
    pub state: PushState,
    pub stream: Option<S>,
    /// Bytes handed to the stream, after compression.
    pub bytes_written: u64,
}

impl<S> PushHandle<S> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Headers exactly as they went out with the push promise.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Wait until the push reaches a terminal state.
    pub async fn wait(self) -> PushOutcome<S> {
        self.done.await.unwrap_or(PushOutcome {
            state: PushState::Errored,
            stream: None,
            bytes_written: 0,
        })
    }
}

// ── Per-push task ─────────────────────────────────────────────────────────────

/// Why a guarded operation stopped early.
enum Interrupt {
    Stream(StreamEvent),
    Connection,
}

struct ActivePush<S> {
    stream: S,
    events: StreamEvents,
    connection: ConnectionWatch,
    lifecycle: Lifecycle,
    reporter: ErrorReporter,
    body: PushBody,
    compress: bool,
    level: u32,
    chunk_size: usize,
    written: u64,
}

impl<S: PushStream> ActivePush<S> {
    async fn run(mut self, done: oneshot::Sender<PushOutcome<S>>) {
        let state = match self.await_acknowledgment().await {
            Ok(()) => {
                self.advance(PushState::Acknowledged);
                self.advance(PushState::Delivering);
                self.deliver().await
            }
            Err(state) => {
                let unsent = std::mem::take(&mut self.body);
                if unsent.has_content() {
                    tracing::debug!(path = %self.reporter.path(), body = unsent.kind(), "discarding unsent body");
                }
                drop(unsent);
                state
            }
        };

        self.advance(state);
        if state != PushState::Finished {
            self.stream.destroy();
        }

        if state == PushState::Finished {
            tracing::info!(path = %self.reporter.path(), bytes = self.written, "push delivered");
        } else {
            tracing::debug!(
                path = %self.reporter.path(),
                state = %self.lifecycle.state(),
                bytes = self.written,
                "push ended early"
            );
        }

        let ActivePush {
            stream, written, ..
        } = self;
        let _ = done.send(PushOutcome {
            state,
            stream: Some(stream),
            bytes_written: written,
        });
    }

    fn advance(&mut self, to: PushState) {
        if let Err(e) = self.lifecycle.advance(to) {
            tracing::warn!(path = %self.reporter.path(), error = %e, "push lifecycle violation");
        }
    }

    /// Wait for the peer to accept the push. Anything else first ends it.
    async fn await_acknowledgment(&mut self) -> Result<(), PushState> {
        let interrupt = tokio::select! {
            biased;
            event = self.events.recv() => Interrupt::Stream(event),
            _ = self.connection.closed() => Interrupt::Connection,
        };
        match interrupt {
            Interrupt::Stream(StreamEvent::Acknowledge) => Ok(()),
            other => Err(self.interrupted(other)),
        }
    }

    async fn deliver(&mut self) -> PushState {
        match std::mem::take(&mut self.body) {
            PushBody::Empty => self.end_stream(None).await,
            PushBody::Bytes(bytes) => self.deliver_bytes(bytes).await,
            PushBody::Stream(reader) => self.pump(BodySource::stream(reader)).await,
            PushBody::File(path) => match BodySource::open_file(&path).await {
                Ok(source) => self.pump(source).await,
                Err(e) => {
                    self.reporter.source(e);
                    PushState::Errored
                }
            },
        }
    }

    async fn deliver_bytes(&mut self, bytes: Bytes) -> PushState {
        if !self.compress {
            return self.end_stream(Some(bytes)).await;
        }
        let gzipped = guarded(
            &mut self.events,
            &mut self.connection,
            compress::gzip_async(bytes, self.level),
        )
        .await;
        match gzipped {
            Ok(Ok(payload)) => self.end_stream(Some(payload)).await,
            Ok(Err(e)) => {
                self.reporter.codec(e);
                PushState::Errored
            }
            Err(interrupt) => self.interrupted(interrupt),
        }
    }

    async fn end_stream(&mut self, last: Option<Bytes>) -> PushState {
        let len = last.as_ref().map_or(0, |b| b.len() as u64);
        match guarded(&mut self.events, &mut self.connection, self.stream.end(last)).await {
            Ok(Ok(())) => {
                self.written += len;
                PushState::Finished
            }
            Ok(Err(e)) => self.stream_failed(e),
            Err(interrupt) => self.interrupted(interrupt),
        }
    }

    /// Copy source -> (gzip) -> stream, one chunk at a time. Each write is
    /// awaited before the next read, so a slow peer throttles the source.
    async fn pump(&mut self, mut source: BodySource) -> PushState {
        let mut encoder = self.compress.then(|| GzipChunker::new(self.level));
        let mut buf = BytesMut::with_capacity(self.chunk_size);

        let state = loop {
            if let Some(event) = self.events.try_recv() {
                if !matches!(event, StreamEvent::Acknowledge) {
                    break self.interrupted(Interrupt::Stream(event));
                }
            }
            if self.connection.is_closed() {
                break self.interrupted(Interrupt::Connection);
            }

            buf.reserve(self.chunk_size);
            let read = guarded(
                &mut self.events,
                &mut self.connection,
                source.read_chunk(&mut buf),
            )
            .await;

            let chunk = match read {
                Err(interrupt) => break self.interrupted(interrupt),
                Ok(Err(e)) => {
                    self.reporter.source(e);
                    break PushState::Errored;
                }
                Ok(Ok(0)) => {
                    let tail = match encoder.take().map(GzipChunker::finish) {
                        None => None,
                        Some(Ok(tail)) => Some(tail),
                        Some(Err(e)) => {
                            self.reporter.codec(e);
                            break PushState::Errored;
                        }
                    };
                    break self.end_stream(tail).await;
                }
                Ok(Ok(_)) => buf.split().freeze(),
            };

            let chunk = match encoder.as_mut() {
                Some(encoder) => match encoder.compress(&chunk) {
                    Ok(out) => out,
                    Err(e) => {
                        self.reporter.codec(e);
                        break PushState::Errored;
                    }
                },
                None => chunk,
            };
            if chunk.is_empty() {
                continue;
            }

            let len = chunk.len() as u64;
            match guarded(&mut self.events, &mut self.connection, self.stream.write(chunk)).await
            {
                Ok(Ok(())) => self.written += len,
                Ok(Err(e)) => break self.stream_failed(e),
                Err(interrupt) => break self.interrupted(interrupt),
            }
        };

        source.release();
        state
    }

    fn stream_failed(&mut self, err: StreamError) -> PushState {
        if self.reporter.stream(err) {
            PushState::Errored
        } else {
            PushState::Closed
        }
    }

    fn interrupted(&mut self, interrupt: Interrupt) -> PushState {
        match interrupt {
            Interrupt::Stream(StreamEvent::Error(e)) => self.stream_failed(e),
            Interrupt::Stream(event) => {
                tracing::debug!(path = %self.reporter.path(), ?event, "push stream ended by peer");
                PushState::Closed
            }
            Interrupt::Connection => {
                tracing::debug!(path = %self.reporter.path(), "connection closed under push");
                PushState::Closed
            }
        }
    }
}

/// Run `op` unless the stream or the connection ends first. A completed
/// operation wins over a simultaneous event. Repeated acknowledgments are
/// ignored.
async fn guarded<F: Future>(
    events: &mut StreamEvents,
    connection: &mut ConnectionWatch,
    op: F,
) -> Result<F::Output, Interrupt> {
    tokio::pin!(op);
    loop {
        tokio::select! {
            biased;
            out = &mut op => return Ok(out),
            event = events.recv() => match event {
                StreamEvent::Acknowledge => tracing::debug!("ignoring repeated acknowledge"),
                event => return Err(Interrupt::Stream(event)),
            },
            _ = connection.closed() => return Err(Interrupt::Connection),
        }
    }
}
