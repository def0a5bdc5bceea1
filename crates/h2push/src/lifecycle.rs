//! Push lifecycle state machine.
//!
//! ```text
//! Requested ──ack──▶ Acknowledged ──▶ Delivering ──▶ Finished
//!     │                   │               │
//!     └───────────────────┴───────────────┴──▶ Errored | Closed
//! ```
//!
//! Terminal states accept no transitions, so a push can finish, error or
//! close exactly once.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushState {
    /// Stream requested, peer has not accepted it yet.
    Requested,
    Acknowledged,
    Delivering,
    /// Body fully written and the stream ended.
    Finished,
    /// Aborted by an error that was surfaced.
    Errored,
    /// Aborted by a reset, a close or a connection close.
    Closed,
}

impl PushState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PushState::Finished | PushState::Errored | PushState::Closed)
    }

    pub fn can_transition(self, to: PushState) -> bool {
        use PushState::*;
        matches!(
            (self, to),
            (Requested, Acknowledged | Errored | Closed)
                | (Acknowledged, Delivering | Errored | Closed)
                | (Delivering, Finished | Errored | Closed)
        )
    }
}

impl fmt::Display for PushState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PushState::Requested => "requested",
            PushState::Acknowledged => "acknowledged",
            PushState::Delivering => "delivering",
            PushState::Finished => "finished",
            PushState::Errored => "errored",
            PushState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid push transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: PushState,
    pub to: PushState,
}

/// Guarded holder of one push's state.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: PushState,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: PushState::Requested,
        }
    }

    pub(crate) fn state(&self) -> PushState {
        self.state
    }

    pub(crate) fn advance(&mut self, to: PushState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::trace!(from = %self.state, %to, "push state");
        self.state = to;
        Ok(())
    }
}
