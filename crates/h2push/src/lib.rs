//! h2push: HTTP/2 server push with on-the-fly gzip.
//!
//! A request handler builds a `PushRequest`, hands it to a `PushCoordinator`
//! together with a `PushContext`, and gets back a `PushHandle`. The
//! coordinator decides compression before the push promise goes out, waits
//! for the peer to acknowledge, then delivers the body. Errors never reach
//! the caller directly; they go to the context's `ErrorSink`, filtered so
//! that routine cancellations stay quiet.

pub mod compress;
pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod plan;
pub mod request;
mod source;
pub mod transport;

pub use compress::{default_filter, is_compressible, ContentFilter};
pub use coordinator::{PushContext, PushCoordinator, PushHandle, PushOutcome};
pub use error::{filter_error, ErrorSink, PushError, StreamError};
pub use lifecycle::{InvalidTransition, PushState};
pub use memory::{MemoryPeer, MemoryPushStream, MemoryTransport, PushedStream};
pub use plan::PushPlan;
pub use request::{BodyReader, PushBody, PushRequest};
pub use transport::{
    Connection, ConnectionWatch, PushStream, PushTransport, StreamEvent, StreamEventSender,
    StreamEvents, RESET_CANCEL,
};

pub use h2push_core::{ByteSize, PushConfig, Priority};
