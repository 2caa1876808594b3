// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Body chunks and the accounting pool behind them.
//!
//! A [`Chunk`] is one contiguous response body fragment as delivered by the
//! origin transport. Chunks are release-on-drop: whoever owns the chunk when
//! it goes out of scope releases it, and handing a chunk to another owner
//! hands over the release obligation with it. The [`ChunkPool`] does not
//! recycle memory (the payload is a cheaply-cloned [`bytes::Bytes`]); it
//! tracks outstanding chunks and bytes so buffer leaks and double releases
//! are observable in tests and admin surfaces.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of pool accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total chunks checked out since the pool was created.
    pub allocated_chunks: u64,
    /// Total chunks released back (dropped) so far.
    pub released_chunks: u64,
    /// Chunks currently alive somewhere in the pipeline.
    pub live_chunks: u64,
    /// Bytes currently alive somewhere in the pipeline.
    pub live_bytes: u64,
}

#[derive(Debug, Default)]
struct PoolInner {
    allocated_chunks: AtomicU64,
    released_chunks: AtomicU64,
    live_chunks: AtomicU64,
    live_bytes: AtomicU64,
}

/// Accounting pool for body chunks.
///
/// Cloning the pool clones a handle to the same accounting cells.
#[derive(Debug, Clone, Default)]
pub struct ChunkPool {
    inner: Arc<PoolInner>,
}

impl ChunkPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `data` into a tracked chunk.
    pub fn checkout(&self, data: impl Into<Bytes>) -> Chunk {
        let data = data.into();
        let bytes = data.len() as u64;
        self.inner.allocated_chunks.fetch_add(1, Ordering::Relaxed);
        self.inner.live_chunks.fetch_add(1, Ordering::Relaxed);
        self.inner.live_bytes.fetch_add(bytes, Ordering::Relaxed);
        Chunk { data, _guard: Some(ReleaseGuard { pool: Arc::clone(&self.inner), bytes }) }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated_chunks: self.inner.allocated_chunks.load(Ordering::Relaxed),
            released_chunks: self.inner.released_chunks.load(Ordering::Relaxed),
            live_chunks: self.inner.live_chunks.load(Ordering::Relaxed),
            live_bytes: self.inner.live_bytes.load(Ordering::Relaxed),
        }
    }

    /// Chunks currently checked out and not yet released.
    #[must_use]
    pub fn live_chunks(&self) -> u64 {
        self.inner.live_chunks.load(Ordering::Relaxed)
    }

    /// Bytes currently checked out and not yet released.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        self.inner.live_bytes.load(Ordering::Relaxed)
    }
}

/// One response body fragment.
///
/// Not `Clone`: each chunk has exactly one owner, and dropping it is the one
/// and only release.
#[derive(Debug)]
pub struct Chunk {
    data: Bytes,
    _guard: Option<ReleaseGuard>,
}

impl Chunk {
    /// A chunk outside any pool (synthetic bodies, tests).
    #[must_use]
    pub fn unpooled(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), _guard: None }
    }

    /// Size of the fragment in bytes.
    #[must_use]
    pub fn readable_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Consumes the chunk, releasing it and returning the payload.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Bytes> for Chunk {
    fn from(data: Bytes) -> Self {
        Self::unpooled(data)
    }
}

impl From<&'static str> for Chunk {
    fn from(data: &'static str) -> Self {
        Self::unpooled(Bytes::from_static(data.as_bytes()))
    }
}

#[derive(Debug)]
struct ReleaseGuard {
    pool: Arc<PoolInner>,
    bytes: u64,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.pool.released_chunks.fetch_add(1, Ordering::Relaxed);
        self.pool.live_chunks.fetch_sub(1, Ordering::Relaxed);
        self.pool.live_bytes.fetch_sub(self.bytes, Ordering::Relaxed);
    }
}
