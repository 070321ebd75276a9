// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! r6index-auth: keeps a fresh Ubisoft session on the bus.
//!
//! Every interval the credential broker runs the two-stage session handshake
//! and the resulting packet is published to a single-slot RabbitMQ queue, so
//! consumers always find the latest credentials waiting.

pub mod config;
pub mod credential;
pub mod error;
pub mod lifecycle;
pub mod publish;
pub mod scheduler;
pub mod test_support;
pub mod transport;

use std::sync::Arc;

use crate::config::AuthConfig;
use crate::credential::broker::CredentialBroker;
use crate::lifecycle::{shutdown_signal, Components};
use crate::publish::{AmqpPublisher, Publisher};
use crate::scheduler::Scheduler;
use crate::transport::TransportClient;

/// Run until a termination signal has been handled.
///
/// Fails early if the bus cannot be reached; fails late if graceful shutdown
/// overruns its deadline.
pub async fn run(config: AuthConfig) -> anyhow::Result<()> {
    let transport = TransportClient::new(&config.transport_settings())?;
    let broker = Arc::new(CredentialBroker::new(transport, config.handshake_settings()));

    let publisher: Arc<dyn Publisher> =
        Arc::new(AmqpPublisher::connect(&config.bus_settings()).await?);

    let scheduler =
        Arc::new(Scheduler::new(config.interval(), Arc::clone(&broker), Arc::clone(&publisher)));

    let components = Components { broker, publisher, scheduler };
    let handle = lifecycle::start(components, config.shutdown_timeout(), shutdown_signal());
    handle.wait().await?;
    Ok(())
}
