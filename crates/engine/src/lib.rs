// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! ProxyKit Engine - The flow-controlled response body producer.
//!
//! This crate implements the streaming heart of the proxy: for every proxied
//! response, a [`BodyContentProducer`] bridges the origin-facing transport
//! (pushing chunks as the channel delivers them) to a downstream consumer
//! pulling chunks on demand.
//!
//! ## Modules
//!
//! - [`fsm`]: Generic serialized state machine with a queue-draining mailbox
//! - [`events`]: The closed set of events driving a producer
//! - [`demand`]: Lock-free downstream demand accounting
//! - [`producer`]: The producer itself: queue, drain, termination, counters
//! - [`stream`]: `futures::Stream` adapter for async consumers
//!
//! ## Quick Start
//!
//! ```ignore
//! use proxykit_core::{Chunk, Origin};
//! use proxykit_engine::{BodyContentProducer, BodyStream, ProducerConfig};
//! use std::sync::Arc;
//!
//! let config = ProducerConfig::new(Origin::new("backend-01", "origin:8080"), "conn-42");
//! let producer = Arc::new(BodyContentProducer::new(config, transport_hooks));
//!
//! // Transport side, as the channel delivers fragments:
//! producer.new_chunk(Chunk::from("hello "));
//! producer.new_chunk(Chunk::from("world"));
//! producer.last_content();
//!
//! // Consumer side:
//! let body = BodyStream::subscribe(Arc::clone(&producer));
//! ```

pub mod demand;
pub mod events;
pub mod fsm;
pub mod producer;
pub mod stream;

pub use demand::Demand;
pub use events::ProducerEvent;
pub use fsm::{EventKind, StateMachine, Step, Transitions};
pub use producer::{BodyContentProducer, ProducerConfig};
pub use stream::BodyStream;
