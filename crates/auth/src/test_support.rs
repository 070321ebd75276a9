// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: in-memory publisher and settings builders.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::credential::HandshakeSettings;
use crate::error::PublishError;
use crate::publish::Publisher;
use crate::transport::{RetryPolicy, TransportSettings};

/// How a [`MemoryPublisher`] answers `publish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishBehavior {
    Accept,
    Nack,
    /// Never completes; only cancellation ends the call.
    Hang,
}

/// Publisher that keeps payloads in memory.
pub struct MemoryPublisher {
    payloads: Mutex<Vec<Vec<u8>>>,
    behavior: Mutex<PublishBehavior>,
    delay: Mutex<Duration>,
    closed: AtomicBool,
    publish_calls: AtomicU32,
    close_calls: AtomicU32,
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            behavior: Mutex::new(PublishBehavior::Accept),
            delay: Mutex::new(Duration::ZERO),
            closed: AtomicBool::new(false),
            publish_calls: AtomicU32::new(0),
            close_calls: AtomicU32::new(0),
        }
    }
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behavior(&self, behavior: PublishBehavior) {
        if let Ok(mut b) = self.behavior.lock() {
            *b = behavior;
        }
    }

    /// Delay every publish by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut d) = self.delay.lock() {
            *d = delay;
        }
    }

    /// Payloads accepted so far, oldest first.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of `publish` invocations, whatever their outcome.
    pub fn publish_calls(&self) -> u32 {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Publisher for MemoryPublisher {
    fn publish(
        &self,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        Box::pin(async move {
            self.publish_calls.fetch_add(1, Ordering::SeqCst);
            if self.is_closed() {
                return Err(PublishError::Closed);
            }
            let delay = self.delay.lock().map(|d| *d).unwrap_or_default();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let behavior = self.behavior.lock().map(|b| *b).unwrap_or(PublishBehavior::Accept);
            match behavior {
                PublishBehavior::Accept => {
                    if let Ok(mut p) = self.payloads.lock() {
                        p.push(payload);
                    }
                    Ok(())
                }
                PublishBehavior::Nack => Err(PublishError::Nacked),
                PublishBehavior::Hang => std::future::pending().await,
            }
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        Box::pin(async move {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Handshake settings pointing at `url` with fixed test header values.
pub fn handshake_settings(url: impl Into<String>) -> HandshakeSettings {
    HandshakeSettings {
        url: url.into(),
        basic_token: "Basic dXNlcjpwYXNz".to_owned(),
        app_id: "legacy-app".to_owned(),
        new_app_id: "new-app".to_owned(),
        user_agent: "test-agent/1.0".to_owned(),
    }
}

/// Transport settings with `attempts` attempts and millisecond backoff.
pub fn fast_transport(attempts: u32) -> TransportSettings {
    TransportSettings {
        connect_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: attempts,
            base: Duration::from_millis(1),
            max: Duration::from_millis(4),
        },
    }
}
