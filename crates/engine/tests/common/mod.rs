// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared test doubles for the producer integration suites.

#![allow(dead_code)]

use bytes::Bytes;
use proxykit_core::chunk::Chunk;
use proxykit_core::error::BodyError;
use proxykit_core::origin::Origin;
use proxykit_core::subscriber::{BodySubscriber, TransportHooks};
use proxykit_engine::{BodyContentProducer, ProducerConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Initialize tracing for test visibility (best-effort, once per binary).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A producer wired to the given hooks with a fixed origin and prefix.
pub fn test_producer(hooks: Arc<RecordingHooks>) -> BodyContentProducer {
    let config =
        ProducerConfig::new(Origin::new("backend-01", "origin.example.com:8080"), "conn-1");
    BodyContentProducer::new(config, hooks)
}

/// One downstream signal as observed by the recording subscriber.
#[derive(Debug, Clone)]
pub enum Signal {
    Next(Bytes),
    Complete,
    Error(Arc<BodyError>),
}

/// Shared, thread-safe log of everything a subscriber received.
#[derive(Debug, Clone, Default)]
pub struct SignalLog {
    signals: Arc<Mutex<Vec<Signal>>>,
    terminal: Arc<std::sync::atomic::AtomicBool>,
}

impl SignalLog {
    fn push(&self, signal: Signal) {
        if matches!(signal, Signal::Complete | Signal::Error(_)) {
            self.terminal.store(true, Ordering::Release);
        }
        self.signals.lock().unwrap_or_else(PoisonError::into_inner).push(signal);
    }

    pub fn snapshot(&self) -> Vec<Signal> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Payloads of every `on_next`, in delivery order.
    pub fn payloads(&self) -> Vec<Bytes> {
        self.snapshot()
            .into_iter()
            .filter_map(|signal| match signal {
                Signal::Next(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.snapshot().iter().filter(|signal| matches!(signal, Signal::Complete)).count()
    }

    pub fn errors(&self) -> Vec<Arc<BodyError>> {
        self.snapshot()
            .into_iter()
            .filter_map(|signal| match signal {
                Signal::Error(cause) => Some(cause),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.completions() + self.errors().len()
    }

    /// Cheap enough to poll from a spin loop.
    pub fn terminal_seen(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// True when exactly one terminal signal was delivered and it was the
    /// last signal.
    pub fn terminal_is_last(&self) -> bool {
        let signals = self.snapshot();
        self.terminal_count() == 1
            && matches!(signals.last(), Some(Signal::Complete | Signal::Error(_)))
    }
}

struct RecordingSubscriber {
    log: SignalLog,
}

impl BodySubscriber for RecordingSubscriber {
    fn on_next(&mut self, chunk: Chunk) {
        self.log.push(Signal::Next(chunk.into_bytes()));
    }

    fn on_complete(&mut self) {
        self.log.push(Signal::Complete);
    }

    fn on_error(&mut self, cause: Arc<BodyError>) {
        self.log.push(Signal::Error(cause));
    }
}

/// A subscriber that records every signal into the returned log.
pub fn recording_subscriber() -> (Box<dyn BodySubscriber>, SignalLog) {
    let log = SignalLog::default();
    (Box::new(RecordingSubscriber { log: log.clone() }), log)
}

/// Transport-side collaborator that counts every callback.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    asked: AtomicU64,
    completions: AtomicU64,
    terminations: Mutex<Vec<String>>,
    tear_downs: AtomicU64,
}

impl RecordingHooks {
    pub fn asked(&self) -> u64 {
        self.asked.load(Ordering::Relaxed)
    }

    pub fn completions(&self) -> u64 {
        self.completions.load(Ordering::Relaxed)
    }

    /// Rendered causes passed to `on_terminate`, in order.
    pub fn terminations(&self) -> Vec<String> {
        self.terminations.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn tear_downs(&self) -> u64 {
        self.tear_downs.load(Ordering::Relaxed)
    }
}

impl TransportHooks for RecordingHooks {
    fn ask_for_more(&self) {
        self.asked.fetch_add(1, Ordering::Relaxed);
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    fn on_terminate(&self, cause: &BodyError) {
        self.terminations.lock().unwrap_or_else(PoisonError::into_inner).push(cause.to_string());
    }

    fn schedule_tear_down(&self) {
        self.tear_downs.fetch_add(1, Ordering::Relaxed);
    }
}
