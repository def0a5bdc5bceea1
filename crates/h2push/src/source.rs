//! Body sources read after acknowledgment, with explicit release.
//!
//! Reaching EOF does not close a file handle or a caller's stream; only
//! dropping the reader does. Every delivery path ends in `release()`, which
//! drops it exactly once no matter how many teardown paths fire.

use std::path::{Path, PathBuf};

use bytes::BytesMut;
use tokio::io::AsyncReadExt;

use crate::request::BodyReader;

pub(crate) struct BodySource {
    reader: Option<BodyReader>,
    origin: Origin,
}

enum Origin {
    Stream,
    File(PathBuf),
}

impl BodySource {
    pub(crate) fn stream(reader: BodyReader) -> Self {
        Self {
            reader: Some(reader),
            origin: Origin::Stream,
        }
    }

    pub(crate) async fn open_file(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            reader: Some(Box::new(file)),
            origin: Origin::File(path.to_path_buf()),
        })
    }

    /// Read up to the spare capacity of `buf`. Returns 0 at EOF or once
    /// released.
    pub(crate) async fn read_chunk(&mut self, buf: &mut BytesMut) -> std::io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read_buf(buf).await,
            None => Ok(0),
        }
    }

    /// Drop the underlying reader. Returns false if it was already gone.
    pub(crate) fn release(&mut self) -> bool {
        match self.reader.take() {
            Some(reader) => {
                drop(reader);
                match &self.origin {
                    Origin::File(path) => {
                        tracing::debug!(file = %path.display(), "released push body file")
                    }
                    Origin::Stream => tracing::debug!("released push body stream"),
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for BodySource {
    fn drop(&mut self) {
        self.release();
    }
}
