//! What a handler asks to push.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::AsyncRead;

use h2push_core::Priority;

/// A live byte stream used as a push body.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// The content source of a push. At most one source per push.
#[derive(Default)]
pub enum PushBody {
    /// Nothing to send; the stream is ended right after acknowledgment.
    #[default]
    Empty,
    /// In-memory payload. Strings convert here with their UTF-8 byte length.
    Bytes(Bytes),
    /// A live stream of unknown length.
    Stream(BodyReader),
    /// A file opened lazily once the peer acknowledges the push.
    File(PathBuf),
}

impl PushBody {
    pub fn stream(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        PushBody::Stream(Box::new(reader))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        PushBody::File(path.into())
    }

    pub fn has_content(&self) -> bool {
        !matches!(self, PushBody::Empty)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            PushBody::Empty => "empty",
            PushBody::Bytes(_) => "bytes",
            PushBody::Stream(_) => "stream",
            PushBody::File(_) => "file",
        }
    }
}

impl fmt::Debug for PushBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushBody::Empty => f.write_str("Empty"),
            PushBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            PushBody::Stream(_) => f.write_str("Stream(..)"),
            PushBody::File(p) => f.debug_tuple("File").field(p).finish(),
        }
    }
}

impl From<Bytes> for PushBody {
    fn from(b: Bytes) -> Self {
        PushBody::Bytes(b)
    }
}

impl From<Vec<u8>> for PushBody {
    fn from(v: Vec<u8>) -> Self {
        PushBody::Bytes(Bytes::from(v))
    }
}

impl From<&'static [u8]> for PushBody {
    fn from(s: &'static [u8]) -> Self {
        PushBody::Bytes(Bytes::from_static(s))
    }
}

impl From<String> for PushBody {
    fn from(s: String) -> Self {
        PushBody::Bytes(Bytes::from(s))
    }
}

impl From<&'static str> for PushBody {
    fn from(s: &'static str) -> Self {
        PushBody::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

/// A single push: path, headers, priority and content.
///
/// The headers are handed to the coordinator, which may set
/// `content-type`, `content-encoding` and `content-length` on them.
#[derive(Debug, Default)]
pub struct PushRequest {
    pub path: String,
    pub headers: HeaderMap,
    /// `None` uses the coordinator's configured default.
    pub priority: Option<Priority>,
    pub body: PushBody,
}

impl PushRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn body(mut self, body: impl Into<PushBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn stream(self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.body(PushBody::stream(reader))
    }

    pub fn file(self, path: impl Into<PathBuf>) -> Self {
        self.body(PushBody::file(path))
    }
}
