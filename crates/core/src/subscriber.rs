// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Collaborator contracts on both sides of a body producer.
//!
//! The producer sits between an origin-facing transport and a downstream
//! consumer. Both collaborators are expressed as traits so transports and
//! consumers can be swapped (and recorded in tests) without touching the
//! producer itself. All callbacks run synchronously inside a producer
//! transition and must not block.

use crate::chunk::Chunk;
use crate::error::BodyError;
use std::sync::Arc;

/// Downstream consumer of a response body.
///
/// At most one subscriber is ever accepted per producer. Signals arrive in
/// stream order: zero or more `on_next` calls followed by exactly one of
/// `on_complete` or `on_error`. Ownership of each chunk transfers with
/// `on_next`; releasing it becomes the subscriber's obligation.
pub trait BodySubscriber: Send {
    /// One body fragment, in arrival order.
    fn on_next(&mut self, chunk: Chunk);

    /// The body finished cleanly. No further signals follow.
    fn on_complete(&mut self);

    /// The body failed. No further signals follow.
    fn on_error(&mut self, cause: Arc<BodyError>);
}

/// Upstream transport collaborator.
///
/// Implemented by the origin-facing connection adapter; lets the producer
/// steer channel reads and report its fate without depending on any
/// concrete transport.
pub trait TransportHooks: Send + Sync {
    /// Resume reads from the origin channel.
    ///
    /// Idempotent; safe to call multiple times per enqueue. Only invoked
    /// while the producer's queue is below the backpressure threshold.
    fn ask_for_more(&self);

    /// Runs exactly once, if and only if the producer completes cleanly.
    fn on_complete(&self);

    /// Runs exactly once, if and only if the producer terminates with a
    /// failure.
    fn on_terminate(&self, cause: &BodyError);

    /// Schedule a delayed tear-down of this response.
    ///
    /// Invoked at most once per producer. Implementations arrange for
    /// `tear_down_resources` to be called after a grace period, giving an
    /// imminent subscriber a window to attach.
    fn schedule_tear_down(&self);
}
