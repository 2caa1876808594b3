// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Producer statistics: chunk/byte counters and peak queue depth.
//!
//! Counters are lock-free atomics so admin surfaces can read them without
//! touching the producer's transition lock. They are monotone for the
//! lifetime of one producer and only ever written from inside a transition,
//! which keeps the derived queue-depth arithmetic exact.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Serializable snapshot of one producer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Chunks enqueued from the origin channel.
    pub received_chunks: u64,
    /// Bytes enqueued from the origin channel.
    pub received_bytes: u64,
    /// Chunks delivered to the subscriber.
    pub emitted_chunks: u64,
    /// Bytes delivered to the subscriber.
    pub emitted_bytes: u64,
    /// Running maximum of `received_chunks - emitted_chunks`.
    pub max_queue_chunks: u64,
    /// Running maximum of `received_bytes - emitted_bytes`.
    pub max_queue_bytes: u64,
}

/// Lock-free counter cells shared between a producer and its observers.
#[derive(Debug, Default)]
pub struct ProducerStats {
    received_chunks: AtomicU64,
    received_bytes: AtomicU64,
    emitted_chunks: AtomicU64,
    emitted_bytes: AtomicU64,
    max_queue_chunks: AtomicU64,
    max_queue_bytes: AtomicU64,
}

impl ProducerStats {
    /// Records one chunk of `bytes` entering the queue and refreshes the
    /// peak queue depth.
    pub fn record_received(&self, bytes: u64) {
        let chunks_total = self.received_chunks.fetch_add(1, Ordering::Relaxed) + 1;
        let bytes_total = self.received_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;

        let depth_chunks = chunks_total - self.emitted_chunks.load(Ordering::Relaxed);
        let depth_bytes = bytes_total - self.emitted_bytes.load(Ordering::Relaxed);
        self.max_queue_chunks.fetch_max(depth_chunks, Ordering::Relaxed);
        self.max_queue_bytes.fetch_max(depth_bytes, Ordering::Relaxed);
    }

    /// Records one chunk of `bytes` delivered to the subscriber.
    pub fn record_emitted(&self, bytes: u64) {
        self.emitted_chunks.fetch_add(1, Ordering::Relaxed);
        self.emitted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    #[must_use]
    pub fn received_chunks(&self) -> u64 {
        self.received_chunks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn emitted_chunks(&self) -> u64 {
        self.emitted_chunks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn emitted_bytes(&self) -> u64 {
        self.emitted_bytes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received_chunks: self.received_chunks.load(Ordering::Relaxed),
            received_bytes: self.received_bytes.load(Ordering::Relaxed),
            emitted_chunks: self.emitted_chunks.load(Ordering::Relaxed),
            emitted_bytes: self.emitted_bytes.load(Ordering::Relaxed),
            max_queue_chunks: self.max_queue_chunks.load(Ordering::Relaxed),
            max_queue_bytes: self.max_queue_bytes.load(Ordering::Relaxed),
        }
    }
}
