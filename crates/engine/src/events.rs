// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Events driving the body producer state machine.
//!
//! A closed sum type: every stimulus the producer can receive, from either
//! collaborator, is one variant with its payload. The transport side injects
//! chunk and channel events; the consumer side injects subscription, demand,
//! and cancellation events.

use crate::fsm::EventKind;
use proxykit_core::chunk::Chunk;
use proxykit_core::error::BodyError;
use proxykit_core::subscriber::BodySubscriber;
use std::fmt;
use std::sync::Arc;

pub enum ProducerEvent {
    /// A new body fragment arrived from the origin channel.
    ContentChunk(Chunk),
    /// The origin signalled end-of-body.
    ContentEnd,
    /// Fatal error on the origin channel.
    ChannelException(Arc<BodyError>),
    /// The origin channel closed; the cause describes why.
    ChannelInactive(Arc<BodyError>),
    /// A downstream consumer attached.
    ContentSubscribed(Box<dyn BodySubscriber>),
    /// The consumer requested `n` more chunks.
    BackpressureRequest(u64),
    /// The consumer detached before the body finished.
    Unsubscribe,
    /// The tear-down grace window expired.
    DelayedTearDown(Arc<BodyError>),
}

impl EventKind for ProducerEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::ContentChunk(_) => "content_chunk",
            Self::ContentEnd => "content_end",
            Self::ChannelException(_) => "channel_exception",
            Self::ChannelInactive(_) => "channel_inactive",
            Self::ContentSubscribed(_) => "content_subscribed",
            Self::BackpressureRequest(_) => "backpressure_request",
            Self::Unsubscribe => "unsubscribe",
            Self::DelayedTearDown(_) => "delayed_tear_down",
        }
    }
}

impl fmt::Debug for ProducerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentChunk(chunk) => {
                f.debug_tuple("ContentChunk").field(&chunk.readable_bytes()).finish()
            },
            Self::ContentEnd => f.write_str("ContentEnd"),
            Self::ChannelException(cause) => {
                f.debug_tuple("ChannelException").field(cause).finish()
            },
            Self::ChannelInactive(cause) => f.debug_tuple("ChannelInactive").field(cause).finish(),
            Self::ContentSubscribed(_) => f.write_str("ContentSubscribed"),
            Self::BackpressureRequest(n) => f.debug_tuple("BackpressureRequest").field(n).finish(),
            Self::Unsubscribe => f.write_str("Unsubscribe"),
            Self::DelayedTearDown(cause) => f.debug_tuple("DelayedTearDown").field(cause).finish(),
        }
    }
}
