// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Producer state machine vocabulary and lifecycle update plumbing.
//!
//! ## State Machine
//!
//! A body producer transitions through these states during its lifetime:
//!
//! ```text
//!        Buffering ─────────────────────┐
//!         │      │                      │
//!  body   │      │ subscriber           │ channel
//!  end    │      │ attaches             │ failure
//!         ▼      ▼                      ▼
//!  BufferingCompleted   Streaming ──→ Terminated
//!         │                 │              ▲
//!         │ subscriber      │ body end     │ failure /
//!         ▼ attaches        ▼              │ cancel
//!  EmittingBufferedContent ──────→ Completed
//! ```
//!
//! `Completed` and `Terminated` are absorbing: once reached, no further
//! transition leaves them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Runtime state of one response body producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerState {
    /// Chunks are arriving before a subscriber exists; everything is buffered
    /// in FIFO order.
    Buffering,

    /// A subscriber is attached; arriving chunks are queued and drained
    /// according to downstream demand.
    Streaming,

    /// End-of-body arrived before any subscription; the whole body is held in
    /// the queue awaiting a subscriber.
    BufferingCompleted,

    /// The subscriber attached after end-of-body; the residual queue is being
    /// drained on demand.
    EmittingBufferedContent,

    /// Terminal success state. The completion signal has been delivered (or
    /// will be ignored if it already was).
    Completed,

    /// Terminal failure state. The error signal has been delivered and all
    /// queued buffers released.
    Terminated,
}

impl ProducerState {
    /// True for the absorbing states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Buffering => "buffering",
            Self::Streaming => "streaming",
            Self::BufferingCompleted => "buffering_completed",
            Self::EmittingBufferedContent => "emitting_buffered_content",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ProducerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A state change notification emitted by a producer.
/// These updates are used for monitoring, debugging, and admin surfaces.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    /// Correlation tag of the producer reporting the change.
    pub prefix: String,
    /// State the producer left.
    pub from: ProducerState,
    /// State the producer entered.
    pub to: ProducerState,
    /// When this change occurred.
    pub timestamp: SystemTime,
}

impl StateUpdate {
    /// Creates a new state update with the current timestamp.
    #[inline]
    pub fn new(prefix: String, from: ProducerState, to: ProducerState) -> Self {
        Self { prefix, from, to, timestamp: SystemTime::now() }
    }
}

/// Helper functions for emitting producer state updates.
pub mod state_helpers {
    use super::{ProducerState, StateUpdate};
    use tokio::sync::mpsc;

    /// Emits a state transition to the provided channel.
    /// Failures are silently ignored as lifecycle tracking is best-effort.
    #[inline]
    pub fn emit_transition(
        state_tx: &mpsc::Sender<StateUpdate>,
        prefix: &str,
        from: ProducerState,
        to: ProducerState,
    ) {
        let _ = state_tx.try_send(StateUpdate::new(prefix.to_string(), from, to));
    }
}
