// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retrying HTTP client for the auth service.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::error::{TransportError, TransportFailure};
use crate::transport::{RetryPolicy, TransportSettings};

/// Decides after each attempt whether another attempt should be made.
pub type RetryPredicate = fn(&Result<Response, reqwest::Error>) -> bool;

/// Default predicate: anything but a 200 is retried.
pub fn retry_unless_ok(outcome: &Result<Response, reqwest::Error>) -> bool {
    match outcome {
        Ok(resp) => resp.status() != StatusCode::OK,
        Err(_) => true,
    }
}

/// HTTP client wrapper with a fixed dial timeout, pooled keep-alive
/// connections, and a bounded retry loop.
pub struct TransportClient {
    http: Client,
    policy: RetryPolicy,
    should_retry: RetryPredicate,
}

impl TransportClient {
    pub fn new(settings: &TransportSettings) -> anyhow::Result<Self> {
        install_crypto_provider();
        let http = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { http, policy: settings.retry, should_retry: retry_unless_ok })
    }

    /// Replace the retry predicate.
    pub fn with_retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.should_retry = predicate;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send a request, retrying per the policy until the predicate accepts
    /// the outcome or the budget is spent.
    ///
    /// `build` is invoked once per attempt since a sent request cannot be
    /// reused. Cancellation is checked before every attempt and raced against
    /// both the in-flight call and the backoff sleep.
    pub async fn execute<F>(
        &self,
        build: F,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = TransportFailure::Network("no attempt made".to_owned());

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(TransportError::Canceled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Canceled),
                outcome = build(&self.http).send() => outcome,
            };

            let retry = (self.should_retry)(&outcome);
            match outcome {
                Ok(resp) if !retry => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    tracing::debug!(attempt, status = status.as_u16(), "attempt rejected");
                    last = TransportFailure::Status(status.as_u16());
                    // Releases the connection back to the pool before sleeping.
                    drop(resp);
                }
                Err(e) => {
                    tracing::debug!(attempt, err = %e, "attempt failed");
                    last = TransportFailure::Network(e.to_string());
                    if !retry {
                        return Err(TransportError::Exhausted { attempts: attempt, last });
                    }
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_for(attempt);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TransportError::Canceled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        tracing::warn!(attempts = max_attempts, last = %last, "retry budget exhausted");
        Err(TransportError::Exhausted { attempts: max_attempts, last })
    }
}

/// reqwest is built without a bundled TLS provider; install ring once.
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
