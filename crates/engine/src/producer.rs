// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The flow-controlled response body producer.
//!
//! One producer exists per proxied response. It bridges the origin-facing
//! transport (which pushes discrete chunks as they arrive on the channel) to
//! a downstream subscriber that pulls chunks on demand, honoring:
//!
//! - late or early subscription relative to body arrival,
//! - demand-driven backpressure via `request(n)`,
//! - premature channel failures and consumer cancellations,
//! - exact release of every buffered chunk on termination,
//! - strict FIFO emission with the terminal signal delivered last.
//!
//! All entry points may be called from any thread; transitions are
//! serialized through the [`StateMachine`] mailbox, so a transition's side
//! effects (enqueue, emit, release, collaborator callbacks) always complete
//! before the next event is handled.

use crate::demand::Demand;
use crate::events::ProducerEvent;
use crate::fsm::{StateMachine, Step, Transitions};
use proxykit_core::chunk::Chunk;
use proxykit_core::error::BodyError;
use proxykit_core::origin::Origin;
use proxykit_core::state::{state_helpers, ProducerState, StateUpdate};
use proxykit_core::stats::{ProducerStats, StatsSnapshot};
use proxykit_core::subscriber::{BodySubscriber, TransportHooks};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Construction parameters for a [`BodyContentProducer`].
pub struct ProducerConfig {
    /// Origin the response is being read from.
    pub origin: Origin,
    /// Correlation tag (connection/request id) included in every log line.
    pub prefix: String,
    /// Optional lifecycle update channel; emission is best-effort.
    pub state_tx: Option<mpsc::Sender<StateUpdate>>,
}

impl ProducerConfig {
    pub fn new(origin: Origin, prefix: impl Into<String>) -> Self {
        Self { origin, prefix: prefix.into(), state_tx: None }
    }

    /// Mirrors every state transition to `state_tx` for monitoring.
    #[must_use]
    pub fn with_state_updates(mut self, state_tx: mpsc::Sender<StateUpdate>) -> Self {
        self.state_tx = Some(state_tx);
        self
    }
}

/// Flow-controlled producer bridging an origin channel to a body subscriber.
pub struct BodyContentProducer {
    machine: StateMachine<ProducerCore>,
    stats: Arc<ProducerStats>,
    origin: Origin,
}

impl BodyContentProducer {
    pub fn new(config: ProducerConfig, hooks: Arc<dyn TransportHooks>) -> Self {
        let stats = Arc::new(ProducerStats::default());
        let core = ProducerCore {
            queue: VecDeque::new(),
            subscriber: None,
            hooks,
            demand: Demand::new(),
            stats: Arc::clone(&stats),
            prefix: config.prefix,
            state_tx: config.state_tx,
            tear_down_scheduled: false,
        };
        Self {
            machine: StateMachine::new(ProducerState::Buffering, core),
            stats,
            origin: config.origin,
        }
    }

    // --- transport side ---

    /// Enqueues one body fragment; the producer takes ownership.
    pub fn new_chunk(&self, chunk: Chunk) {
        self.machine.handle(ProducerEvent::ContentChunk(chunk));
    }

    /// Signals end-of-body.
    pub fn last_content(&self) {
        self.machine.handle(ProducerEvent::ContentEnd);
    }

    /// Signals a fatal error on the origin channel.
    pub fn channel_exception(&self, cause: BodyError) {
        self.machine.handle(ProducerEvent::ChannelException(Arc::new(cause)));
    }

    /// Signals that the origin channel closed.
    pub fn channel_inactive(&self, cause: BodyError) {
        self.machine.handle(ProducerEvent::ChannelInactive(Arc::new(cause)));
    }

    /// Signals that the tear-down grace window expired.
    ///
    /// Called by the transport after [`TransportHooks::schedule_tear_down`]
    /// fired and the delay elapsed. The resulting cause carries the origin
    /// identity and the live counters for diagnosis.
    pub fn tear_down_resources(&self) {
        let stats = self.stats.snapshot();
        let cause = BodyError::ResponseTimeout {
            origin: self.origin.clone(),
            reason: "response body not consumed within the tear-down grace period".to_string(),
            received_bytes: stats.received_bytes,
            received_chunks: stats.received_chunks,
            emitted_bytes: stats.emitted_bytes,
            emitted_chunks: stats.emitted_chunks,
        };
        self.machine.handle(ProducerEvent::DelayedTearDown(Arc::new(cause)));
    }

    // --- consumer side ---

    /// Registers the sole subscriber.
    ///
    /// A second call errors both the newcomer and, if the body is still
    /// live, the existing subscriber, terminating the producer.
    pub fn on_subscribed(&self, subscriber: Box<dyn BodySubscriber>) {
        self.machine.handle(ProducerEvent::ContentSubscribed(subscriber));
    }

    /// Adds `n` to downstream demand, saturating at unbounded.
    pub fn request(&self, n: u64) {
        self.machine.handle(ProducerEvent::BackpressureRequest(n));
    }

    /// Cancels the subscription. Treated as a consumer failure, not a clean
    /// stop: buffered content is dropped and the transport is told to
    /// terminate.
    pub fn unsubscribe(&self) {
        self.machine.handle(ProducerEvent::Unsubscribe);
    }

    // --- observability ---

    #[must_use]
    pub fn state(&self) -> ProducerState {
        self.machine.state()
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }
}

/// Transition logic and producer-owned state, driven by the [`StateMachine`].
struct ProducerCore {
    queue: VecDeque<Chunk>,
    subscriber: Option<Box<dyn BodySubscriber>>,
    hooks: Arc<dyn TransportHooks>,
    demand: Demand,
    stats: Arc<ProducerStats>,
    prefix: String,
    state_tx: Option<mpsc::Sender<StateUpdate>>,
    tear_down_scheduled: bool,
}

impl Transitions for ProducerCore {
    type State = ProducerState;
    type Event = ProducerEvent;

    fn transition(&mut self, state: ProducerState, event: ProducerEvent) -> Step<ProducerState> {
        match state {
            ProducerState::Buffering => self.in_buffering(event),
            ProducerState::BufferingCompleted => self.in_buffering_completed(event),
            ProducerState::Streaming => self.in_streaming(event),
            ProducerState::EmittingBufferedContent => self.in_emitting_buffered(event),
            ProducerState::Completed => self.in_completed(event),
            ProducerState::Terminated => self.in_terminated(event),
        }
    }

    fn on_inappropriate(&mut self, state: ProducerState, event_kind: &'static str) {
        self.warn_event("inappropriate event", state, event_kind);
    }

    fn on_transition(&mut self, from: ProducerState, to: ProducerState) {
        if from == to {
            return;
        }
        tracing::trace!(prefix = %self.prefix, from = %from, to = %to, "state transition");
        if let Some(state_tx) = &self.state_tx {
            state_helpers::emit_transition(state_tx, &self.prefix, from, to);
        }
    }
}

impl ProducerCore {
    fn in_buffering(&mut self, event: ProducerEvent) -> Step<ProducerState> {
        match event {
            ProducerEvent::ContentChunk(chunk) => {
                self.enqueue(chunk);
                self.ask_for_more_if_starved();
                Step::Next(ProducerState::Buffering)
            },
            ProducerEvent::ContentEnd => Step::Next(ProducerState::BufferingCompleted),
            ProducerEvent::ChannelInactive(cause) | ProducerEvent::ChannelException(cause) => {
                self.terminate(&cause)
            },
            ProducerEvent::ContentSubscribed(subscriber) => {
                self.subscriber = Some(subscriber);
                self.emit_chunks();
                self.ask_for_more_if_starved();
                Step::Next(ProducerState::Streaming)
            },
            ProducerEvent::BackpressureRequest(n) => {
                self.demand.add(n);
                self.ask_for_more_if_starved();
                Step::Next(ProducerState::Buffering)
            },
            ProducerEvent::Unsubscribe | ProducerEvent::DelayedTearDown(_) => Step::Inappropriate,
        }
    }

    fn in_buffering_completed(&mut self, event: ProducerEvent) -> Step<ProducerState> {
        match event {
            ProducerEvent::ContentChunk(chunk) => {
                self.spurious_chunk(chunk, ProducerState::BufferingCompleted);
                Step::Next(ProducerState::BufferingCompleted)
            },
            ProducerEvent::ContentEnd => Step::Next(ProducerState::BufferingCompleted),
            ProducerEvent::ChannelInactive(_) => {
                self.schedule_tear_down();
                Step::Next(ProducerState::BufferingCompleted)
            },
            ProducerEvent::ChannelException(cause) => {
                // The body is already fully buffered; terminating here would
                // race a tear-down that may be in flight.
                tracing::debug!(
                    prefix = %self.prefix,
                    cause = %cause,
                    "channel exception after end-of-body, ignored"
                );
                Step::Next(ProducerState::BufferingCompleted)
            },
            ProducerEvent::ContentSubscribed(subscriber) => {
                self.subscriber = Some(subscriber);
                self.emit_chunks();
                if self.queue.is_empty() {
                    self.complete();
                    Step::Next(ProducerState::Completed)
                } else {
                    Step::Next(ProducerState::EmittingBufferedContent)
                }
            },
            ProducerEvent::BackpressureRequest(n) => {
                self.demand.add(n);
                Step::Next(ProducerState::BufferingCompleted)
            },
            ProducerEvent::Unsubscribe => Step::Inappropriate,
            ProducerEvent::DelayedTearDown(cause) => self.terminate(&cause),
        }
    }

    fn in_streaming(&mut self, event: ProducerEvent) -> Step<ProducerState> {
        match event {
            ProducerEvent::ContentChunk(chunk) => {
                self.enqueue(chunk);
                self.emit_chunks();
                self.ask_for_more_if_starved();
                Step::Next(ProducerState::Streaming)
            },
            ProducerEvent::ContentEnd => {
                if self.queue.is_empty() {
                    self.complete();
                    Step::Next(ProducerState::Completed)
                } else {
                    Step::Next(ProducerState::EmittingBufferedContent)
                }
            },
            ProducerEvent::ChannelInactive(cause) | ProducerEvent::ChannelException(cause) => {
                self.terminate(&cause)
            },
            ProducerEvent::ContentSubscribed(subscriber) => {
                self.secondary_subscription(subscriber, ProducerState::Streaming)
            },
            ProducerEvent::BackpressureRequest(n) => {
                self.demand.add(n);
                self.emit_chunks();
                self.ask_for_more_if_starved();
                Step::Next(ProducerState::Streaming)
            },
            ProducerEvent::Unsubscribe => {
                let cause = Arc::new(BodyError::ConsumerDisconnected {
                    message: "subscriber cancelled mid-stream".to_string(),
                    state: ProducerState::Streaming,
                });
                self.terminate(&cause)
            },
            ProducerEvent::DelayedTearDown(_) => Step::Inappropriate,
        }
    }

    fn in_emitting_buffered(&mut self, event: ProducerEvent) -> Step<ProducerState> {
        match event {
            ProducerEvent::ContentChunk(chunk) => {
                self.spurious_chunk(chunk, ProducerState::EmittingBufferedContent);
                Step::Next(ProducerState::EmittingBufferedContent)
            },
            ProducerEvent::ContentEnd => Step::Next(ProducerState::EmittingBufferedContent),
            ProducerEvent::ChannelInactive(_) => {
                self.schedule_tear_down();
                Step::Next(ProducerState::EmittingBufferedContent)
            },
            ProducerEvent::ChannelException(cause) => {
                tracing::debug!(
                    prefix = %self.prefix,
                    cause = %cause,
                    "channel exception after end-of-body, ignored"
                );
                Step::Next(ProducerState::EmittingBufferedContent)
            },
            ProducerEvent::ContentSubscribed(subscriber) => {
                self.secondary_subscription(subscriber, ProducerState::EmittingBufferedContent)
            },
            ProducerEvent::BackpressureRequest(n) => {
                self.demand.add(n);
                self.emit_chunks();
                if self.queue.is_empty() {
                    self.complete();
                    Step::Next(ProducerState::Completed)
                } else {
                    Step::Next(ProducerState::EmittingBufferedContent)
                }
            },
            ProducerEvent::Unsubscribe => {
                let cause = Arc::new(BodyError::ConsumerDisconnected {
                    message: "subscriber cancelled while draining buffered content".to_string(),
                    state: ProducerState::EmittingBufferedContent,
                });
                self.terminate(&cause)
            },
            ProducerEvent::DelayedTearDown(cause) => self.terminate(&cause),
        }
    }

    fn in_completed(&mut self, event: ProducerEvent) -> Step<ProducerState> {
        match event {
            ProducerEvent::ContentChunk(chunk) => {
                self.spurious_chunk(chunk, ProducerState::Completed);
                Step::Next(ProducerState::Completed)
            },
            ProducerEvent::ContentSubscribed(subscriber) => {
                self.reject_subscription(subscriber, ProducerState::Completed);
                Step::Next(ProducerState::Completed)
            },
            ProducerEvent::ContentEnd
            | ProducerEvent::BackpressureRequest(_)
            | ProducerEvent::Unsubscribe
            | ProducerEvent::DelayedTearDown(_) => Step::Next(ProducerState::Completed),
            ProducerEvent::ChannelInactive(_) | ProducerEvent::ChannelException(_) => {
                Step::Inappropriate
            },
        }
    }

    fn in_terminated(&mut self, event: ProducerEvent) -> Step<ProducerState> {
        match event {
            ProducerEvent::ContentChunk(chunk) => {
                self.spurious_chunk(chunk, ProducerState::Terminated);
                Step::Next(ProducerState::Terminated)
            },
            ProducerEvent::ContentSubscribed(subscriber) => {
                self.reject_subscription(subscriber, ProducerState::Terminated);
                Step::Next(ProducerState::Terminated)
            },
            ProducerEvent::BackpressureRequest(_) => Step::Next(ProducerState::Terminated),
            ProducerEvent::ContentEnd
            | ProducerEvent::ChannelInactive(_)
            | ProducerEvent::ChannelException(_)
            | ProducerEvent::Unsubscribe
            | ProducerEvent::DelayedTearDown(_) => Step::Inappropriate,
        }
    }

    // --- shared transition pieces ---

    fn enqueue(&mut self, chunk: Chunk) {
        self.stats.record_received(chunk.readable_bytes());
        self.queue.push_back(chunk);
    }

    /// Drains the queue into the subscriber while demand allows.
    fn emit_chunks(&mut self) {
        let Some(subscriber) = self.subscriber.as_mut() else {
            return;
        };
        while !self.queue.is_empty() {
            if !self.demand.try_claim() {
                break;
            }
            let Some(chunk) = self.queue.pop_front() else {
                self.demand.restore();
                break;
            };
            self.stats.record_emitted(chunk.readable_bytes());
            subscriber.on_next(chunk);
        }
    }

    /// Resumes origin reads while the queue is below the backpressure
    /// threshold of one buffered chunk.
    fn ask_for_more_if_starved(&self) {
        if self.queue.is_empty() {
            self.hooks.ask_for_more();
        }
    }

    /// Errors the subscriber (if any), releases the queue, and reports the
    /// failure upstream. Always lands in `Terminated`.
    fn terminate(&mut self, cause: &Arc<BodyError>) -> Step<ProducerState> {
        if let Some(mut subscriber) = self.subscriber.take() {
            subscriber.on_error(Arc::clone(cause));
        }
        self.release_queue();
        self.hooks.on_terminate(cause);
        Step::Next(ProducerState::Terminated)
    }

    fn complete(&mut self) {
        if let Some(mut subscriber) = self.subscriber.take() {
            subscriber.on_complete();
        }
        self.hooks.on_complete();
    }

    fn release_queue(&mut self) {
        let dropped = self.queue.len();
        self.queue.clear();
        if dropped > 0 {
            tracing::debug!(prefix = %self.prefix, chunks = dropped, "released undelivered chunks");
        }
    }

    fn schedule_tear_down(&mut self) {
        if self.tear_down_scheduled {
            return;
        }
        self.tear_down_scheduled = true;
        self.hooks.schedule_tear_down();
    }

    fn secondary_subscription(
        &mut self,
        mut newcomer: Box<dyn BodySubscriber>,
        state: ProducerState,
    ) -> Step<ProducerState> {
        self.warn_event("secondary content subscription", state, "content_subscribed");
        let cause = Arc::new(BodyError::SecondarySubscription { state });
        newcomer.on_error(Arc::clone(&cause));
        self.terminate(&cause)
    }

    /// A subscription attempt against an already-finished body: the newcomer
    /// is errored, the terminal state stands.
    fn reject_subscription(&mut self, mut newcomer: Box<dyn BodySubscriber>, state: ProducerState) {
        self.warn_event("subscription after terminal state", state, "content_subscribed");
        newcomer.on_error(Arc::new(BodyError::SecondarySubscription { state }));
    }

    fn spurious_chunk(&mut self, chunk: Chunk, state: ProducerState) {
        self.warn_event("spurious content chunk after end-of-body", state, "content_chunk");
        drop(chunk);
    }

    fn warn_event(&self, msg: &str, state: ProducerState, event_kind: &'static str) {
        let stats = self.stats.snapshot();
        tracing::warn!(
            prefix = %self.prefix,
            state = %state,
            event = event_kind,
            received_chunks = stats.received_chunks,
            received_bytes = stats.received_bytes,
            emitted_chunks = stats.emitted_chunks,
            emitted_bytes = stats.emitted_bytes,
            max_queue_chunks = stats.max_queue_chunks,
            max_queue_bytes = stats.max_queue_bytes,
            "{msg}"
        );
    }
}
