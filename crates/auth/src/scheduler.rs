// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-interval driver for the handshake-and-publish cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::credential::broker::CredentialBroker;
use crate::publish::Publisher;

/// Shortest accepted tick period; `tokio::time::interval` rejects zero.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Counters accumulated over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub published: u64,
    pub failed: u64,
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Single-run guard: at most one cycle holds it at a time.
///
/// The publisher's channel is shared across cycles, so overlapping cycles
/// are refused rather than queued.
struct RunGuard {
    busy: watch::Sender<bool>,
}

struct RunPermit<'a> {
    busy: &'a watch::Sender<bool>,
}

impl RunGuard {
    fn new() -> Self {
        Self { busy: watch::Sender::new(false) }
    }

    fn try_acquire(&self) -> Option<RunPermit<'_>> {
        let acquired = self.busy.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        acquired.then_some(RunPermit { busy: &self.busy })
    }

    async fn idle(&self) {
        let mut rx = self.busy.subscribe();
        let _ = rx.wait_for(|busy| !*busy).await;
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.busy.send_replace(false);
    }
}

/// Runs [`CredentialBroker::run_cycle`] once per interval until stopped.
pub struct Scheduler {
    interval: Duration,
    broker: Arc<CredentialBroker>,
    publisher: Arc<dyn Publisher>,
    stop: CancellationToken,
    draining: CancellationToken,
    guard: RunGuard,
    counters: Counters,
}

impl Scheduler {
    /// `interval` is raised to [`MIN_INTERVAL`] if shorter.
    pub fn new(
        interval: Duration,
        broker: Arc<CredentialBroker>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(?interval, "interval below minimum, clamping");
        }
        Self {
            interval: interval.max(MIN_INTERVAL),
            broker,
            publisher,
            stop: CancellationToken::new(),
            draining: CancellationToken::new(),
            guard: RunGuard::new(),
            counters: Counters::default(),
        }
    }

    /// Block until [`Self::stop`] is called.
    ///
    /// The first tick fires immediately. Ticks run inline, so a slow cycle
    /// delays the next one instead of overlapping it; missed ticks are skipped.
    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = timer.tick() => {}
            }
            self.tick().await;
        }

        tracing::info!("scheduler stopped");
    }

    /// Run one cycle now unless another is in flight. Failures are logged
    /// and counted, never propagated.
    pub async fn tick(&self) {
        let Some(_permit) = self.guard.try_acquire() else {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("previous cycle still running, skipping tick");
            return;
        };
        if self.draining.is_cancelled() || self.stop.is_cancelled() {
            return;
        }
        let tick = self.counters.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        match self.broker.run_cycle(self.publisher.as_ref()).await {
            Ok(outcome) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                tracing::info!(tick, bytes = outcome.payload_bytes, "credentials published");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(tick, code = e.code(), "cycle failed: {e}");
            }
        }
    }

    /// Refuse new cycles from now on; the loop keeps waiting for `stop`.
    pub fn drain(&self) {
        self.draining.cancel();
    }

    /// Resolve once no cycle is in flight.
    pub async fn idle(&self) {
        self.guard.idle().await;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_busy(&self) -> bool {
        *self.guard.busy.borrow()
    }

    /// Stop the loop. An in-flight tick finishes (or aborts through the
    /// broker's token) before `run` returns.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Convenience for spawning the loop on the runtime.
pub fn spawn_scheduler(scheduler: Arc<Scheduler>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { scheduler.run().await })
}
