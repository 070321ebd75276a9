// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session credentials: handshake wire types and the published packet.
//!
//! A refresh cycle makes two session calls. The "basic" stage authenticates
//! with the account's username/password; the "token" stage presents the
//! basic-stage ticket to the newer session surface. Both results travel
//! together as one [`CredentialPacket`].

pub mod broker;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Which of the two session calls is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStage {
    Basic,
    Token,
}

impl HandshakeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by the session endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeResponse {
    pub session_id: String,
    pub ticket: String,
    pub expiration: String,
}

impl HandshakeResponse {
    /// Decode a response body, tagging failures with the stage.
    pub fn decode(stage: HandshakeStage, body: &[u8]) -> Result<Self, AuthError> {
        serde_json::from_slice(body)
            .map_err(|e| AuthError::ResponseDecode { stage, reason: e.to_string() })
    }
}

impl fmt::Debug for HandshakeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeResponse")
            .field("session_id", &"<redacted>")
            .field("ticket", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Combined result of both handshake stages, as published on the bus.
///
/// Field order is part of the wire contract.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPacket {
    pub ticket: String,
    pub session_id: String,
    pub expiration: String,
    pub ticket_new: String,
    pub session_id_new: String,
    pub expiration_new: String,
}

impl CredentialPacket {
    pub fn assemble(basic: HandshakeResponse, token: HandshakeResponse) -> Self {
        Self {
            ticket: basic.ticket,
            session_id: basic.session_id,
            expiration: basic.expiration,
            ticket_new: token.ticket,
            session_id_new: token.session_id,
            expiration_new: token.expiration,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, AuthError> {
        serde_json::to_vec(self).map_err(AuthError::Encode)
    }
}

impl fmt::Debug for CredentialPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPacket")
            .field("expiration", &self.expiration)
            .field("expiration_new", &self.expiration_new)
            .finish_non_exhaustive()
    }
}

/// Endpoint and per-deployment header values for the handshake.
#[derive(Clone)]
pub struct HandshakeSettings {
    pub url: String,
    /// Full `Authorization` header value for the basic stage, computed once.
    pub basic_token: String,
    pub app_id: String,
    pub new_app_id: String,
    pub user_agent: String,
}

impl fmt::Debug for HandshakeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeSettings")
            .field("url", &self.url)
            .field("app_id", &self.app_id)
            .field("new_app_id", &self.new_app_id)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
