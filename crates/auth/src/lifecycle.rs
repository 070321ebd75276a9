// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown coordination: `Running -> ShuttingDown -> Stopped`.
//!
//! Two tasks are spawned: the scheduler loop, and a controller that waits
//! for the shutdown trigger. On trigger the controller stops new cycles,
//! waits (bounded) for the in-flight cycle, tears everything down in order,
//! and reports exactly one terminal result before closing the result channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::credential::broker::CredentialBroker;
use crate::error::AuthError;
use crate::publish::Publisher;
use crate::scheduler::{spawn_scheduler, Scheduler};

/// Externally observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    /// Terminal; there is no restart path.
    Stopped,
}

/// Everything the controller tears down.
pub struct Components {
    pub broker: Arc<CredentialBroker>,
    pub publisher: Arc<dyn Publisher>,
    pub scheduler: Arc<Scheduler>,
}

/// Handle returned by [`start`].
pub struct LifecycleHandle {
    result_rx: mpsc::Receiver<Result<(), AuthError>>,
    state_rx: watch::Receiver<LifecycleState>,
}

impl LifecycleHandle {
    pub fn state(&self) -> LifecycleState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_rx.clone()
    }

    /// Next message on the result channel; `None` once it is closed.
    pub async fn recv(&mut self) -> Option<Result<(), AuthError>> {
        self.result_rx.recv().await
    }

    /// Wait for the terminal result.
    pub async fn wait(mut self) -> Result<(), AuthError> {
        self.recv().await.unwrap_or(Ok(()))
    }
}

/// Start the scheduler and the shutdown controller.
///
/// `trigger` resolves when shutdown should begin (normally
/// [`shutdown_signal`]). `timeout` bounds the wait for in-flight work, and
/// bounds teardown again, so the result arrives within twice `timeout` of
/// the trigger.
pub fn start<F>(components: Components, timeout: Duration, trigger: F) -> LifecycleHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let (result_tx, result_rx) = mpsc::channel(1);
    let (state_tx, state_rx) = watch::channel(LifecycleState::Running);

    let mut loop_handle = spawn_scheduler(Arc::clone(&components.scheduler));

    tokio::spawn(async move {
        trigger.await;
        info!("shutdown signal received");
        state_tx.send_replace(LifecycleState::ShuttingDown);

        let Components { broker, publisher, scheduler } = components;
        scheduler.drain();

        let mut outcome = match tokio::time::timeout(timeout, scheduler.idle()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "in-flight cycle did not finish");
                Err(AuthError::ShutdownTimeout(timeout))
            }
        };

        // Teardown runs whichever way the wait ended, within a second window
        // of the same length.
        let teardown_deadline = Instant::now() + timeout;
        match tokio::time::timeout_at(teardown_deadline, publisher.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("failed to close publisher: {e}"),
            Err(_) => {
                warn!("publisher close did not finish in time");
                outcome = outcome.and(Err(AuthError::ShutdownTimeout(timeout)));
            }
        }
        broker.stop();
        scheduler.stop();
        match tokio::time::timeout_at(teardown_deadline, &mut loop_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("scheduler task ended abnormally: {e}"),
            Err(_) => {
                warn!("scheduler task did not stop in time, aborting it");
                loop_handle.abort();
                outcome = outcome.and(Err(AuthError::ShutdownTimeout(timeout)));
            }
        }

        let stats = scheduler.stats();
        info!(
            ticks = stats.ticks,
            published = stats.published,
            failed = stats.failed,
            "shutdown finished"
        );

        state_tx.send_replace(LifecycleState::Stopped);
        let _ = result_tx.send(outcome).await;
        // Dropping the sender closes the channel: no further results.
    });

    LifecycleHandle { result_rx, state_rx }
}

/// Resolve on SIGINT, SIGTERM, or SIGQUIT.
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();
    let mut sigquit = signal(SignalKind::quit()).ok();

    tokio::select! {
        _ = async {
            if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
        } => info!("received SIGTERM"),
        _ = async {
            if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
        } => info!("received SIGINT"),
        _ = async {
            if let Some(ref mut s) = sigquit { s.recv().await } else { std::future::pending().await }
        } => info!("received SIGQUIT"),
    }
}
