// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pull-based consumer adapter exposing a producer as a [`futures::Stream`].
//!
//! [`BodyStream`] is the idiomatic downstream surface: it subscribes to a
//! producer, requests exactly one chunk per pending poll (strict pull, no
//! internal buffering beyond what the producer already holds), and wakes the
//! task when a chunk or the terminal signal arrives. Dropping the stream
//! before the terminal signal unsubscribes, which the producer treats as a
//! consumer disconnect.

use crate::producer::BodyContentProducer;
use bytes::Bytes;
use futures::Stream;
use proxykit_core::chunk::Chunk;
use proxykit_core::error::BodyError;
use proxykit_core::subscriber::BodySubscriber;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

#[derive(Debug, Clone)]
enum Terminal {
    Completed,
    Failed(Arc<BodyError>),
}

#[derive(Debug, Default)]
struct Shared {
    ready: VecDeque<Bytes>,
    terminal: Option<Terminal>,
    /// Chunks requested from the producer but not yet delivered.
    outstanding: u64,
    waker: Option<Waker>,
}

impl Shared {
    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

struct StreamSubscriber {
    shared: Arc<Mutex<Shared>>,
}

impl BodySubscriber for StreamSubscriber {
    fn on_next(&mut self, chunk: Chunk) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.ready.push_back(chunk.into_bytes());
        shared.outstanding = shared.outstanding.saturating_sub(1);
        shared.wake();
    }

    fn on_complete(&mut self) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.terminal = Some(Terminal::Completed);
        shared.wake();
    }

    fn on_error(&mut self, cause: Arc<BodyError>) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.terminal = Some(Terminal::Failed(cause));
        shared.wake();
    }
}

/// A response body as an async stream of byte buffers.
///
/// Yields each fragment in arrival order, then ends after the terminal
/// signal: `None` on clean completion, one `Err` (then `None`) on failure.
#[must_use = "streams do nothing unless polled"]
pub struct BodyStream {
    producer: Arc<BodyContentProducer>,
    shared: Arc<Mutex<Shared>>,
    finished: bool,
}

impl BodyStream {
    /// Subscribes to `producer` and exposes its body as a stream.
    pub fn subscribe(producer: Arc<BodyContentProducer>) -> Self {
        let shared = Arc::new(Mutex::new(Shared::default()));
        producer.on_subscribed(Box::new(StreamSubscriber { shared: Arc::clone(&shared) }));
        Self { producer, shared, finished: false }
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, Arc<BodyError>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        loop {
            let need_request = {
                let mut shared = this.shared.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(bytes) = shared.ready.pop_front() {
                    return Poll::Ready(Some(Ok(bytes)));
                }
                if let Some(terminal) = shared.terminal.clone() {
                    this.finished = true;
                    return match terminal {
                        Terminal::Completed => Poll::Ready(None),
                        Terminal::Failed(cause) => Poll::Ready(Some(Err(cause))),
                    };
                }
                shared.waker = Some(cx.waker().clone());
                if shared.outstanding == 0 {
                    shared.outstanding = 1;
                    true
                } else {
                    false
                }
            };

            if need_request {
                // The request may deliver synchronously; re-check before
                // parking.
                this.producer.request(1);
                continue;
            }
            return Poll::Pending;
        }
    }
}

impl Drop for BodyStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let terminal_seen = {
            let shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.terminal.is_some()
        };
        if !terminal_seen {
            self.producer.unsubscribe();
        }
    }
}
