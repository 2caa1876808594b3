// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! ProxyKit Core - Fundamental traits and data structures for proxied HTTP
//! body streaming.
//!
//! This crate defines the shared vocabulary of the body pipeline:
//!
//! ## Core Modules
//!
//! - [`chunk`]: Body fragments and the accounting pool tracking their lifecycle
//! - [`subscriber`]: Contracts for the downstream consumer and the origin transport
//! - [`state`]: Producer state machine vocabulary and lifecycle updates
//! - [`stats`]: Per-producer counters and queue depth tracking
//! - [`error`]: Error types flowing through the pipeline
//! - [`origin`]: Identity of the upstream origin a body is read from

// Module declarations
pub mod chunk;
pub mod error;
pub mod origin;
pub mod state;
pub mod stats;
pub mod subscriber;

// Convenience re-exports for commonly used types

// Buffers
pub use chunk::{Chunk, ChunkPool, PoolStats};

// Error handling
pub use error::BodyError;

// Origin identity
pub use origin::Origin;

// Lifecycle
pub use state::{state_helpers, ProducerState, StateUpdate};

// Counters
pub use stats::{ProducerStats, StatsSnapshot};

// Collaborator contracts
pub use subscriber::{BodySubscriber, TransportHooks};
