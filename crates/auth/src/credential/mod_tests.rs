// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn response(session: &str, ticket: &str, exp: &str) -> HandshakeResponse {
    HandshakeResponse {
        session_id: session.to_owned(),
        ticket: ticket.to_owned(),
        expiration: exp.to_owned(),
    }
}

#[test]
fn packet_serializes_fields_in_wire_order() -> anyhow::Result<()> {
    let packet =
        CredentialPacket::assemble(response("s1", "t1", "e1"), response("s2", "t2", "e2"));
    let json = String::from_utf8(packet.to_json()?)?;
    assert_eq!(
        json,
        r#"{"ticket":"t1","sessionId":"s1","expiration":"e1","ticketNew":"t2","sessionIdNew":"s2","expirationNew":"e2"}"#
    );
    Ok(())
}

#[test]
fn packet_round_trips_without_loss() -> anyhow::Result<()> {
    let packet = CredentialPacket::assemble(
        response("a-b", "ey.J/+=", "2026-10-16T12:00:00.000Z"),
        response("", "ünïcode", "not a date"),
    );
    let decoded: CredentialPacket = serde_json::from_slice(&packet.to_json()?)?;
    assert_eq!(decoded, packet);
    Ok(())
}

#[test]
fn decode_ignores_unknown_fields() -> anyhow::Result<()> {
    let body = br#"{"sessionId":"s","ticket":"t","expiration":"e","profileId":"p","spaceId":"x"}"#;
    let resp = HandshakeResponse::decode(HandshakeStage::Basic, body)?;
    assert_eq!(resp, response("s", "t", "e"));
    Ok(())
}

#[yare::parameterized(
    not_json = { b"<html>502</html>" },
    missing_ticket = { br#"{"sessionId":"s","expiration":"e"}"# },
    numeric_expiration = { br#"{"sessionId":"s","ticket":"t","expiration":42}"# },
    empty = { b"" },
)]
fn decode_rejects(body: &[u8]) {
    let err = HandshakeResponse::decode(HandshakeStage::Token, body);
    assert!(matches!(err, Err(AuthError::ResponseDecode { stage: HandshakeStage::Token, .. })));
}

#[test]
fn debug_never_prints_credentials() {
    let packet = CredentialPacket::assemble(
        response("session-one", "secret-one", "e1"),
        response("session-two", "secret-two", "e2"),
    );
    let debug = format!("{packet:?} {:?}", response("session-three", "secret-three", "e"));
    assert!(!debug.contains("secret"));
    assert!(!debug.contains("session-"));
    assert!(debug.contains("e1") && debug.contains("e2"));
}
