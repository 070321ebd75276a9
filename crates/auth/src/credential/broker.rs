// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential broker: runs the two-stage session handshake and hands the
//! resulting packet to the publisher.

use reqwest::header::{AUTHORIZATION, CONNECTION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;

use crate::credential::{CredentialPacket, HandshakeResponse, HandshakeSettings, HandshakeStage};
use crate::error::AuthError;
use crate::publish::Publisher;
use crate::transport::TransportClient;

const APP_ID_HEADER: &str = "Ubi-AppId";

/// One session call: the basic stage, or the token stage carrying the
/// basic-stage ticket.
enum SessionCall<'a> {
    Basic,
    Token { ticket: &'a str },
}

impl SessionCall<'_> {
    fn stage(&self) -> HandshakeStage {
        match self {
            Self::Basic => HandshakeStage::Basic,
            Self::Token { .. } => HandshakeStage::Token,
        }
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub payload_bytes: usize,
}

/// Performs the handshake against the auth service.
///
/// Every cycle runs in a child of the broker's root token; [`Self::stop`]
/// cancels the root so in-flight and future cycles abort.
pub struct CredentialBroker {
    transport: TransportClient,
    settings: HandshakeSettings,
    root: CancellationToken,
}

impl CredentialBroker {
    pub fn new(transport: TransportClient, settings: HandshakeSettings) -> Self {
        Self::with_root(transport, settings, CancellationToken::new())
    }

    /// Build a broker whose cycles derive from an existing process token.
    pub fn with_root(
        transport: TransportClient,
        settings: HandshakeSettings,
        root: CancellationToken,
    ) -> Self {
        Self { transport, settings, root }
    }

    /// Cancel the active cycle, if any, and every cycle after it.
    pub fn stop(&self) {
        self.root.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Run both handshake stages in a fresh cancellation scope.
    pub async fn handshake(&self) -> Result<CredentialPacket, AuthError> {
        let scope = self.root.child_token();
        let _guard = scope.clone().drop_guard();
        self.handshake_in(&scope).await
    }

    /// Handshake, serialize, and publish once.
    ///
    /// Nothing reaches the publisher unless both stages succeed.
    pub async fn run_cycle(&self, publisher: &dyn Publisher) -> Result<CycleOutcome, AuthError> {
        let scope = self.root.child_token();
        let _guard = scope.clone().drop_guard();

        let packet = self.handshake_in(&scope).await?;
        let payload = packet.to_json()?;
        drop(packet);
        let payload_bytes = payload.len();

        tokio::select! {
            biased;
            _ = scope.cancelled() => Err(AuthError::ContextCanceled { during: "publish" }),
            result = publisher.publish(payload) => {
                result?;
                Ok(CycleOutcome { payload_bytes })
            }
        }
    }

    async fn handshake_in(&self, scope: &CancellationToken) -> Result<CredentialPacket, AuthError> {
        let basic = self.session(SessionCall::Basic, scope).await?;
        if basic.ticket.is_empty() {
            return Err(AuthError::ResponseDecode {
                stage: HandshakeStage::Basic,
                reason: "empty ticket".to_owned(),
            });
        }
        tracing::debug!(stage = "basic", "session obtained");

        let token = self.session(SessionCall::Token { ticket: &basic.ticket }, scope).await?;
        tracing::debug!(stage = "token", "session obtained");

        Ok(CredentialPacket::assemble(basic, token))
    }

    async fn session(
        &self,
        call: SessionCall<'_>,
        scope: &CancellationToken,
    ) -> Result<HandshakeResponse, AuthError> {
        let stage = call.stage();
        let resp = self
            .transport
            .execute(|http| self.build_request(http, &call), scope)
            .await
            .map_err(|e| AuthError::from_transport(stage, e))?;

        let status = resp.status().as_u16();
        let body = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(AuthError::ContextCanceled { during: stage.as_str() }),
            body = resp.bytes() => body.map_err(|e| AuthError::ResponseDecode {
                stage,
                reason: format!("body read failed (status {status}): {e}"),
            })?,
        };

        HandshakeResponse::decode(stage, &body)
    }

    fn build_request(&self, http: &Client, call: &SessionCall<'_>) -> RequestBuilder {
        let req = http
            .post(&self.settings.url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONNECTION, "keep-alive");

        match call {
            SessionCall::Basic => req
                .header(APP_ID_HEADER, &self.settings.app_id)
                .header(AUTHORIZATION, &self.settings.basic_token),
            SessionCall::Token { ticket } => req
                .header(APP_ID_HEADER, &self.settings.new_app_id)
                .header(AUTHORIZATION, format!("Ubi_v1 t={ticket}"))
                .header(USER_AGENT, &self.settings.user_agent),
        }
    }
}
