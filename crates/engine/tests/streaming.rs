// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the `BodyStream` consumer adapter and for
//! producers driven concurrently from transport and consumer threads.

mod common;

use bytes::Bytes;
use common::{recording_subscriber, test_producer, RecordingHooks};
use futures::StreamExt;
use proxykit_core::chunk::ChunkPool;
use proxykit_core::error::BodyError;
use proxykit_core::state::ProducerState;
use proxykit_engine::BodyStream;
use std::sync::Arc;
use std::time::Duration;

fn sequence_payload(sequence: u32) -> Bytes {
    Bytes::copy_from_slice(&sequence.to_be_bytes())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[allow(clippy::expect_used)]
async fn test_body_stream_collects_pushed_chunks() {
    common::init_tracing();
    let hooks = Arc::new(RecordingHooks::default());
    let producer = Arc::new(test_producer(Arc::clone(&hooks)));
    let pool = ChunkPool::new();

    let stream = BodyStream::subscribe(Arc::clone(&producer));
    let collector = tokio::spawn(async move {
        let mut stream = stream;
        let mut collected = Vec::new();
        while let Some(item) = stream.next().await {
            collected.push(item.expect("clean body must not yield an error"));
        }
        collected
    });

    for sequence in 0..20 {
        producer.new_chunk(pool.checkout(sequence_payload(sequence)));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    producer.last_content();

    let collected = tokio::time::timeout(Duration::from_secs(5), collector)
        .await
        .expect("stream must end after last_content")
        .expect("collector task must not panic");

    let expected: Vec<Bytes> = (0..20).map(sequence_payload).collect();
    assert_eq!(collected, expected);
    assert_eq!(producer.state(), ProducerState::Completed);
    assert_eq!(hooks.completions(), 1);
    assert_eq!(pool.live_chunks(), 0);
}

#[tokio::test]
async fn test_body_stream_surfaces_channel_failure() {
    common::init_tracing();
    let hooks = Arc::new(RecordingHooks::default());
    let producer = Arc::new(test_producer(Arc::clone(&hooks)));
    let pool = ChunkPool::new();

    let mut stream = BodyStream::subscribe(Arc::clone(&producer));
    producer.new_chunk(pool.checkout(Bytes::from_static(b"partial")));

    let first = stream.next().await;
    assert!(matches!(first, Some(Ok(bytes)) if bytes == Bytes::from_static(b"partial")));

    producer.channel_exception(BodyError::ChannelClosed { message: "mid-body".to_string() });

    let second = stream.next().await;
    assert!(
        matches!(second, Some(Err(ref cause)) if matches!(**cause, BodyError::ChannelClosed { .. }))
    );
    assert!(stream.next().await.is_none());
    assert_eq!(producer.state(), ProducerState::Terminated);
    assert_eq!(pool.live_chunks(), 0);
}

#[tokio::test]
async fn test_dropping_the_stream_cancels_the_body() {
    common::init_tracing();
    let hooks = Arc::new(RecordingHooks::default());
    let producer = Arc::new(test_producer(Arc::clone(&hooks)));
    let pool = ChunkPool::new();

    let stream = BodyStream::subscribe(Arc::clone(&producer));
    producer.new_chunk(pool.checkout(Bytes::from_static(b"unwanted")));
    drop(stream);

    assert_eq!(producer.state(), ProducerState::Terminated);
    assert_eq!(pool.live_chunks(), 0);
    let terminations = hooks.terminations();
    assert_eq!(terminations.len(), 1);
    assert!(terminations[0].contains("consumer disconnected"));
}

/// Transport pushing from one thread while the consumer requests from
/// another: counters, ordering, and buffer accounting all hold at the end.
#[test]
fn test_concurrent_push_and_request_preserves_invariants() {
    common::init_tracing();
    const CHUNKS: u32 = 500;

    let hooks = Arc::new(RecordingHooks::default());
    let producer = Arc::new(test_producer(Arc::clone(&hooks)));
    let pool = ChunkPool::new();
    let (subscriber, log) = recording_subscriber();
    producer.on_subscribed(subscriber);

    let pusher = {
        let producer = Arc::clone(&producer);
        let pool = pool.clone();
        std::thread::spawn(move || {
            for sequence in 0..CHUNKS {
                producer.new_chunk(pool.checkout(sequence_payload(sequence)));
            }
            producer.last_content();
        })
    };
    let requester = {
        let producer = Arc::clone(&producer);
        let log = log.clone();
        std::thread::spawn(move || {
            for _ in 0..1_000_000 {
                if log.terminal_seen() {
                    return;
                }
                producer.request(3);
                std::thread::yield_now();
            }
        })
    };

    let _ = pusher.join();
    let _ = requester.join();

    // Finish any residual drain if the requester thread gave up first.
    for _ in 0..=CHUNKS {
        if log.terminal_seen() {
            break;
        }
        producer.request(64);
    }

    assert!(log.terminal_seen());
    assert_eq!(log.completions(), 1);
    assert!(log.terminal_is_last());
    assert_eq!(producer.state(), ProducerState::Completed);

    let expected: Vec<Bytes> = (0..CHUNKS).map(sequence_payload).collect();
    assert_eq!(log.payloads(), expected);

    let stats = producer.stats();
    assert_eq!(stats.received_chunks, u64::from(CHUNKS));
    assert_eq!(stats.emitted_chunks, u64::from(CHUNKS));
    assert_eq!(stats.received_bytes, stats.emitted_bytes);
    assert!(stats.max_queue_chunks <= u64::from(CHUNKS));
    assert_eq!(hooks.completions(), 1);
    assert!(hooks.terminations().is_empty());
    assert_eq!(pool.live_chunks(), 0);
}
