// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the body pipeline.
//!
//! A single failure cause may have to reach several parties (the subscriber,
//! a rejected second subscriber, the terminate hook), so causes travel as
//! `Arc<BodyError>` and the variants carry everything a log line or an
//! upstream handler needs to act on them.

use crate::origin::Origin;
use crate::state::ProducerState;
use thiserror::Error;

/// Failure causes flowing through the body pipeline.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The downstream consumer went away before the body finished.
    ///
    /// Raised when the subscriber unsubscribes mid-stream. From the
    /// producer's point of view this is a failure, not a clean stop: buffered
    /// content is dropped and the transport is told to terminate.
    #[error("consumer disconnected in state {state}: {message}")]
    ConsumerDisconnected { message: String, state: ProducerState },

    /// The tear-down grace window expired with nobody draining the body.
    #[error(
        "response timeout from origin {origin}: {reason} \
         (received {received_bytes} bytes in {received_chunks} chunks, \
         emitted {emitted_bytes} bytes in {emitted_chunks} chunks)"
    )]
    ResponseTimeout {
        origin: Origin,
        reason: String,
        received_bytes: u64,
        received_chunks: u64,
        emitted_bytes: u64,
        emitted_chunks: u64,
    },

    /// The body was subscribed to more than once, or after it already
    /// reached a terminal state.
    #[error("content stream may only be subscribed to once (current state {state})")]
    SecondarySubscription { state: ProducerState },

    /// The origin channel closed before the body completed.
    #[error("origin channel closed: {message}")]
    ChannelClosed { message: String },

    /// Fatal I/O failure on the origin channel.
    #[error("origin channel error: {0}")]
    Io(#[from] std::io::Error),
}
