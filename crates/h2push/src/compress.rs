//! gzip for pushed payloads. Holds the compressible filter, a one-shot codec
//! for in-memory bodies, and a chunked encoder for streamed ones.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;

use h2push_core::content_type::essence;

/// Decides from a content-type whether a payload is worth gzipping.
pub type ContentFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Compressible types outside `text/*` and the `+json`/`+xml`/`+text`
/// suffix families.
const COMPRESSIBLE: &[&str] = &[
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/json",
    "application/manifest+json",
    "application/xml",
    "application/xhtml+xml",
    "application/rss+xml",
    "application/atom+xml",
    "application/x-www-form-urlencoded",
    "application/graphql",
    "application/vnd.ms-fontobject",
    "application/x-font-ttf",
    "application/x-font-otf",
    "application/x-sh",
    "application/x-tar",
    "font/ttf",
    "font/otf",
    "font/eot",
    "image/bmp",
    "image/svg+xml",
    "image/x-icon",
    "image/vnd.microsoft.icon",
];

/// The default filter.
pub fn is_compressible(content_type: &str) -> bool {
    let essence = essence(content_type);
    if essence.is_empty() {
        return false;
    }
    if essence.starts_with("text/") {
        return true;
    }
    if essence.ends_with("+json") || essence.ends_with("+xml") || essence.ends_with("+text") {
        return true;
    }
    COMPRESSIBLE.contains(&essence.as_str())
}

pub fn default_filter() -> ContentFilter {
    Arc::new(is_compressible)
}

/// One-shot gzip.
pub fn gzip(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

/// gzip on the blocking pool so large payloads don't stall the runtime.
pub async fn gzip_async(data: Bytes, level: u32) -> std::io::Result<Bytes> {
    tokio::task::spawn_blocking(move || gzip(&data, level))
        .await
        .map_err(std::io::Error::other)?
        .map(Bytes::from)
}

/// Incremental gzip over a sequence of chunks. The concatenation of every
/// `compress` output followed by `finish` is one gzip member.
pub struct GzipChunker {
    encoder: GzEncoder<Vec<u8>>,
}

impl GzipChunker {
    pub fn new(level: u32) -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::new(level)),
        }
    }

    /// Feed a chunk; returns whatever compressed output is ready, which may
    /// be empty while deflate is still buffering.
    pub fn compress(&mut self, chunk: &[u8]) -> std::io::Result<Bytes> {
        self.encoder.write_all(chunk)?;
        Ok(Bytes::from(std::mem::take(self.encoder.get_mut())))
    }

    /// Flush the remaining output and the gzip trailer.
    pub fn finish(self) -> std::io::Result<Bytes> {
        self.encoder.finish().map(Bytes::from)
    }
}
