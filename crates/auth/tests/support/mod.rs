// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stub session endpoint for integration tests.
//!
//! Serves `POST /v3/profiles/sessions` on an ephemeral port. The stage of a
//! call is told apart by its `Authorization` scheme; each stage replays a
//! scripted queue of replies and falls back to a default success body.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

pub const SESSION_PATH: &str = "/v3/profiles/sessions";

pub const BASIC_OK: &str = r#"{"sessionId":"s1","ticket":"t1","expiration":"e1"}"#;
pub const TOKEN_OK: &str = r#"{"sessionId":"s2","ticket":"t2","expiration":"e2"}"#;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, String),
    /// Hold the request open forever.
    Hang,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Self::Json(200, body.to_owned())
    }

    pub fn status(code: u16) -> Self {
        Self::Json(code, r#"{"error":"unavailable"}"#.to_owned())
    }
}

#[derive(Default)]
struct Script {
    basic: VecDeque<Reply>,
    token: VecDeque<Reply>,
    basic_default: Option<Reply>,
    token_default: Option<Reply>,
}

/// Recorded request, stage plus headers.
#[derive(Debug, Clone)]
pub struct Seen {
    pub token_stage: bool,
    pub headers: HeaderMap,
}

#[derive(Default)]
pub struct StubAuth {
    script: Mutex<Script>,
    basic_calls: AtomicU32,
    token_calls: AtomicU32,
    seen: Mutex<Vec<Seen>>,
}

impl StubAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue replies for the basic stage.
    pub fn script_basic(&self, replies: impl IntoIterator<Item = Reply>) {
        if let Ok(mut s) = self.script.lock() {
            s.basic.extend(replies);
        }
    }

    /// Queue replies for the token stage.
    pub fn script_token(&self, replies: impl IntoIterator<Item = Reply>) {
        if let Ok(mut s) = self.script.lock() {
            s.token.extend(replies);
        }
    }

    /// Reply used for the basic stage once its queue is empty.
    pub fn default_basic(&self, reply: Reply) {
        if let Ok(mut s) = self.script.lock() {
            s.basic_default = Some(reply);
        }
    }

    pub fn default_token(&self, reply: Reply) {
        if let Ok(mut s) = self.script.lock() {
            s.token_default = Some(reply);
        }
    }

    pub fn basic_calls(&self) -> u32 {
        self.basic_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> u32 {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Bind on an ephemeral port and serve in the background.
    ///
    /// Returns the full session URL.
    pub async fn serve(self: &Arc<Self>) -> anyhow::Result<String> {
        let router = Router::new().route(SESSION_PATH, post(session)).with_state(Arc::clone(self));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(format!("http://{addr}{SESSION_PATH}"))
    }

    fn next_reply(&self, token_stage: bool) -> Reply {
        let Ok(mut guard) = self.script.lock() else {
            return Reply::status(500);
        };
        let script = &mut *guard;
        let (queue, default, fallback) = if token_stage {
            (&mut script.token, script.token_default.clone(), TOKEN_OK)
        } else {
            (&mut script.basic, script.basic_default.clone(), BASIC_OK)
        };
        queue.pop_front().or(default).unwrap_or_else(|| Reply::ok(fallback))
    }
}

async fn session(State(stub): State<Arc<StubAuth>>, headers: HeaderMap) -> Response {
    let token_stage = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Ubi_v1 "));

    if token_stage {
        stub.token_calls.fetch_add(1, Ordering::SeqCst);
    } else {
        stub.basic_calls.fetch_add(1, Ordering::SeqCst);
    }
    if let Ok(mut seen) = stub.seen.lock() {
        seen.push(Seen { token_stage, headers: headers.clone() });
    }

    match stub.next_reply(token_stage) {
        Reply::Json(code, body) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(CONTENT_TYPE, "application/json")], body).into_response()
        }
        Reply::Hang => std::future::pending().await,
    }
}

/// A URL nothing is listening on.
pub async fn dead_url() -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}{SESSION_PATH}"))
}
