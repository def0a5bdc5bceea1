//! Push errors and the suppression policy for benign protocol noise.

use std::sync::Arc;

use tokio::sync::mpsc;

/// An error reported by a transport's push stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The peer cancelled the stream (RST_STREAM).
    #[error("stream reset by peer (code {0:#x})")]
    Reset(u32),
    /// A write raced with an end that already happened.
    #[error("write after end")]
    WriteAfterEnd,
    /// The transport or its stream is gone.
    #[error("stream closed")]
    Closed,
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport error: {0}")]
    Transport(String),
}

impl StreamError {
    /// Resets and post-end write races are expected whenever a peer cancels a
    /// push or two cleanup paths overlap. They are never surfaced.
    pub fn is_benign(&self) -> bool {
        matches!(self, StreamError::Reset(_) | StreamError::WriteAfterEnd)
    }
}

/// Errors delivered to the error sink.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("transport refused push for {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: StreamError,
    },
    #[error("push stream for {path} failed: {source}")]
    Stream {
        path: String,
        #[source]
        source: StreamError,
    },
    #[error("gzip failed for {path}: {source}")]
    Codec {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("body source for {path} failed: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PushError {
    pub fn path(&self) -> &str {
        match self {
            PushError::Open { path, .. }
            | PushError::Stream { path, .. }
            | PushError::Codec { path, .. }
            | PushError::Source { path, .. } => path,
        }
    }
}

/// Drop benign stream errors, wrap the rest for the error sink.
pub fn filter_error(path: &str, err: StreamError) -> Option<PushError> {
    if err.is_benign() {
        tracing::debug!(path, error = %err, "suppressed benign stream error");
        return None;
    }
    Some(PushError::Stream {
        path: path.to_string(),
        source: err,
    })
}

// ── Error sink ────────────────────────────────────────────────────────────────

/// Where asynchronous push failures end up. Cheap to clone; shared by every
/// push issued from the same request context.
#[derive(Clone)]
pub struct ErrorSink {
    inner: Arc<dyn Fn(PushError) + Send + Sync>,
}

impl ErrorSink {
    pub fn new(f: impl Fn(PushError) + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    /// A sink that forwards into a channel. Errors reported after the
    /// receiver is dropped are logged instead.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PushError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self::new(move |err| {
            if let Err(mpsc::error::SendError(err)) = tx.send(err) {
                tracing::warn!(path = err.path(), error = %err, "push error (receiver gone)");
            }
        });
        (sink, rx)
    }

    pub fn report(&self, err: PushError) {
        (self.inner)(err)
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new(|err| tracing::warn!(path = err.path(), error = %err, "push failed"))
    }
}

impl std::fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

/// Per-push wrapper around the sink: at most one error per push.
pub(crate) struct ErrorReporter {
    sink: ErrorSink,
    path: String,
    reported: bool,
}

impl ErrorReporter {
    pub(crate) fn new(sink: ErrorSink, path: &str) -> Self {
        Self {
            sink,
            path: path.to_string(),
            reported: false,
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn surface(&mut self, err: PushError) {
        if self.reported {
            tracing::debug!(path = %self.path, error = %err, "dropping secondary push error");
            return;
        }
        self.reported = true;
        tracing::warn!(path = %self.path, error = %err, "push error");
        self.sink.report(err);
    }

    /// Returns true when the error was real (and surfaced).
    pub(crate) fn stream(&mut self, err: StreamError) -> bool {
        match filter_error(&self.path, err) {
            Some(err) => {
                self.surface(err);
                true
            }
            None => false,
        }
    }

    pub(crate) fn codec(&mut self, source: std::io::Error) {
        let path = self.path.clone();
        self.surface(PushError::Codec { path, source });
    }

    pub(crate) fn source(&mut self, source: std::io::Error) {
        let path = self.path.clone();
        self.surface(PushError::Source { path, source });
    }

    pub(crate) fn open(&mut self, source: StreamError) {
        if source.is_benign() {
            tracing::debug!(path = %self.path, error = %source, "push refused by peer");
            return;
        }
        let path = self.path.clone();
        self.surface(PushError::Open { path, source });
    }
}
