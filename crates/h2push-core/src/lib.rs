//! h2push-core: configuration and shared types for server push.
//! The coordinator crate depends on this one.

pub mod config;
pub mod content_type;
pub mod priority;
pub mod size;

pub use config::{ConfigError, PushConfig, DEFAULT_THRESHOLD};
pub use priority::{InvalidPriority, Priority};
pub use size::{ByteSize, SizeParseError};
