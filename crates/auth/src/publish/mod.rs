// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery of credential packets to the message bus.

pub mod amqp;

use std::future::Future;
use std::pin::Pin;

use crate::error::PublishError;

pub use amqp::AmqpPublisher;

/// Content type of every published payload.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Sink for serialized credential packets.
///
/// Object-safe for use as `Arc<dyn Publisher>`. Implementations must tolerate
/// being shared across tasks; the scheduler serializes publishes, but the
/// implementation still guards its channel so that a second caller cannot
/// interleave frames.
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>>;

    /// Tear down channel then connection. Calling twice is a no-op.
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>>;
}

/// Bus endpoint and topology names.
#[derive(Clone)]
pub struct BusSettings {
    pub url: String,
    pub exchange: String,
    pub queue: String,
}

impl std::fmt::Debug for BusSettings {
    // The URL carries the broker password.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusSettings")
            .field("exchange", &self.exchange)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
