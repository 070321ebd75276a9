// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::time::Duration;

use crate::credential::HandshakeStage;

/// Why the final attempt of a transport call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The server answered with a non-success status.
    Status(u16),
    /// Dial, TLS, timeout, or other connection-level failure.
    Network(String),
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "status {code}"),
            Self::Network(msg) => write!(f, "network: {msg}"),
        }
    }
}

/// Failure surfaced by [`crate::transport::TransportClient::execute`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("gave up after {attempts} attempts ({last})")]
    Exhausted { attempts: u32, last: TransportFailure },
    #[error("request canceled")]
    Canceled,
}

/// Failure delivering a payload to the bus.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),
    #[error("broker rejected the message")]
    Nacked,
    #[error("publisher is closed")]
    Closed,
    #[error("bus did not acknowledge close within {0:?}")]
    CloseTimeout(Duration),
}

/// Errors of the credential refresh pipeline.
///
/// Per-tick variants are logged and the tick is abandoned. `ConnectionSetup`
/// is fatal at startup and `ShutdownTimeout` is reported once on the
/// lifecycle result channel.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{stage} handshake: gave up after {attempts} attempts ({last})")]
    TransportExhausted { stage: HandshakeStage, attempts: u32, last: TransportFailure },

    #[error("{stage} handshake: undecodable response: {reason}")]
    ResponseDecode { stage: HandshakeStage, reason: String },

    #[error("cycle canceled during {during}")]
    ContextCanceled { during: &'static str },

    #[error("credential packet encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("bus setup failed at {step}: {source}")]
    ConnectionSetup {
        step: &'static str,
        #[source]
        source: lapin::Error,
    },

    #[error("graceful shutdown exceeded {0:?}")]
    ShutdownTimeout(Duration),
}

impl AuthError {
    /// Map a transport failure onto the taxonomy, tagging it with the stage.
    pub fn from_transport(stage: HandshakeStage, err: TransportError) -> Self {
        match err {
            TransportError::Exhausted { attempts, last } => {
                Self::TransportExhausted { stage, attempts, last }
            }
            TransportError::Canceled => Self::ContextCanceled { during: stage.as_str() },
        }
    }

    /// Stable machine-readable code, used as a log field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransportExhausted { .. } => "TRANSPORT_EXHAUSTED",
            Self::ResponseDecode { .. } => "RESPONSE_DECODE",
            Self::ContextCanceled { .. } => "CONTEXT_CANCELED",
            Self::Encode(_) => "ENCODE",
            Self::Publish(_) => "PUBLISH",
            Self::ConnectionSetup { .. } => "CONNECTION_SETUP",
            Self::ShutdownTimeout(_) => "SHUTDOWN_TIMEOUT",
        }
    }

    /// Whether the error only abandons the current tick.
    pub fn is_per_tick(&self) -> bool {
        !matches!(self, Self::ConnectionSetup { .. } | Self::ShutdownTimeout(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
