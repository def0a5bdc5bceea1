//! h2push integration test harness.
//!
//! Every test drives the public API end to end over the in-memory
//! transport: a coordinator pushes, a `MemoryPeer` plays the browser.
//!
//!   RUST_LOG=h2push=debug cargo test --test integration
//!
//! Temp files are unique per test, so tests may run in parallel.

mod strings;

use std::io::Read;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use anyhow::{Context, Result};
use h2push::{
    Connection, ErrorSink, MemoryPeer, MemoryTransport, PushContext, PushCoordinator, PushError,
    PushedStream,
};
use h2push_core::PushConfig;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc::UnboundedReceiver;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Body chunks the peer lets queue up per stream.
pub const PEER_BUFFER: usize = 8;

/// Honour RUST_LOG when set; quiet otherwise.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One server connection with a single peer attached.
pub struct Session {
    pub coordinator: PushCoordinator,
    pub ctx: PushContext<MemoryTransport>,
    pub peer: MemoryPeer,
    pub connection: Connection,
    pub errors: UnboundedReceiver<PushError>,
}

impl Session {
    pub fn new(config: PushConfig) -> Self {
        init_tracing();
        let (transport, peer) = MemoryTransport::pair(PEER_BUFFER);
        let connection = Connection::new();
        let (sink, errors) = ErrorSink::channel();
        Session {
            coordinator: PushCoordinator::new(config),
            ctx: PushContext::new(transport, connection.watch(), sink),
            peer,
            connection,
            errors,
        }
    }

    /// Receive the next push promise and accept it.
    pub async fn accept(&mut self) -> Result<PushedStream> {
        let pushed = self
            .peer
            .next_push()
            .await
            .context("transport dropped before a push arrived")?;
        pushed.acknowledge();
        Ok(pushed)
    }

    /// Errors reported so far, without waiting.
    pub fn drain_errors(&mut self) -> Vec<PushError> {
        let mut out = Vec::new();
        while let Ok(err) = self.errors.try_recv() {
            out.push(err);
        }
        out
    }
}

/// Default configuration with a different compression threshold.
pub fn config_with_threshold(threshold: &str) -> PushConfig {
    let mut config = PushConfig::default();
    config.compression.threshold = threshold.parse().expect("valid size");
    config
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data)
        .read_to_end(&mut out)
        .context("payload is not valid gzip")?;
    Ok(out)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Removes its file on drop.
pub struct TempFile(pub PathBuf);

impl TempFile {
    pub fn new(name: &str, contents: &[u8]) -> Result<Self> {
        let id = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("h2push-it-{}-{}", std::process::id(), id));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(TempFile(path))
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Some(dir) = self.0.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }
}

/// Reader wrapper that counts how often it was dropped and how many bytes
/// were pulled through it.
pub struct Tracked<R> {
    inner: R,
    drops: Arc<AtomicUsize>,
    read: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub struct Counters {
    drops: Arc<AtomicUsize>,
    read: Arc<AtomicUsize>,
}

impl Counters {
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    pub fn bytes_read(&self) -> usize {
        self.read.load(Ordering::SeqCst)
    }
}

pub fn tracked<R>(inner: R) -> (Tracked<R>, Counters) {
    let counters = Counters {
        drops: Arc::new(AtomicUsize::new(0)),
        read: Arc::new(AtomicUsize::new(0)),
    };
    let reader = Tracked {
        inner,
        drops: counters.drops.clone(),
        read: counters.read.clone(),
    };
    (reader, counters)
}

impl<R: AsyncRead + Unpin> AsyncRead for Tracked<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let res = Pin::new(&mut this.inner).poll_read(cx, buf);
        this.read
            .fetch_add(buf.filled().len() - before, Ordering::SeqCst);
        res
    }
}

impl<R> Drop for Tracked<R> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Config round-trips through the on-disk format the coordinator loads.
#[test]
fn test_config_file_roundtrip() -> Result<()> {
    let file = TempFile::new(
        "h2push.toml",
        b"[compression]\nthreshold = \"100kb\"\nlevel = 9\n\n[push]\ndefault_priority = 3\n",
    )?;
    let config = PushConfig::from_file(&file.0)?;
    assert_eq!(config.compression.threshold.bytes(), 100 * 1024);
    assert_eq!(config.compression.level, 9);
    assert_eq!(u8::from(config.push.default_priority), 3);
    assert!(config.files.stat_for_length, "unset sections keep defaults");
    Ok(())
}
