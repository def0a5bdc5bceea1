//! Length resolution and the compression decision.
//!
//! Both run before the push stream is opened, because they decide the
//! headers that go out with the PUSH_PROMISE.

use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};

use h2push_core::Priority;

use crate::compress::ContentFilter;
use crate::request::PushBody;

/// A request after its headers have been finalized.
#[derive(Debug)]
pub struct PushPlan {
    pub path: String,
    pub headers: HeaderMap,
    pub priority: Priority,
    pub body: PushBody,
    /// Decided once; never changes for the life of the push.
    pub compress: bool,
    /// Predicted uncompressed length, `None` when unknown.
    pub length: Option<u64>,
}

/// Predicted payload length. Files consult `content-length` first and, when
/// `stat` is set, the file system; a failed stat means "unknown".
pub(crate) async fn resolve_length(body: &PushBody, headers: &HeaderMap, stat: bool) -> Option<u64> {
    match body {
        PushBody::Empty => Some(0),
        PushBody::Bytes(bytes) => Some(bytes.len() as u64),
        PushBody::Stream(_) => None,
        PushBody::File(path) => {
            if let Some(len) = header_length(headers) {
                return Some(len);
            }
            if !stat {
                return None;
            }
            match tokio::fs::metadata(path).await {
                Ok(meta) => Some(meta.len()),
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "stat failed, length unknown");
                    None
                }
            }
        }
    }
}

fn header_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn has_encoding(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .is_some_and(|v| !v.as_bytes().is_empty())
}

/// Compress iff there is content, its length is unknown or above the
/// threshold, nothing set an encoding already, and the filter accepts the
/// content-type. A missing content-type is never compressible.
pub(crate) fn should_compress(
    body: &PushBody,
    length: Option<u64>,
    headers: &HeaderMap,
    threshold: u64,
    filter: &ContentFilter,
) -> bool {
    if !body.has_content() {
        return false;
    }
    if length.is_some_and(|len| len <= threshold) {
        return false;
    }
    if has_encoding(headers) {
        return false;
    }
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| filter(ct))
}

/// Compressed payloads change size, so their content-length goes away.
/// Otherwise a known length is written out exactly.
pub(crate) fn apply_decision(headers: &mut HeaderMap, compress: bool, length: Option<u64>) {
    if compress {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.remove(CONTENT_LENGTH);
    } else if let Some(len) = length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
}
