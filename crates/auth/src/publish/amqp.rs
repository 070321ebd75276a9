// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RabbitMQ publisher: durable fanout exchange bound to a single-slot queue.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AuthError, PublishError};
use crate::publish::{BusSettings, Publisher, CONTENT_TYPE_JSON};

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// Persistent delivery mode.
const DELIVERY_PERSISTENT: u8 = 2;

/// Upper bound on each close handshake (channel, then connection).
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct Link {
    connection: Connection,
    channel: Channel,
}

/// Publishes to a fanout exchange over one long-lived connection and channel.
///
/// No reconnect: a broken connection surfaces as a publish error until the
/// process is restarted. `close` cancels `closing` before taking the link, so
/// a publish stalled on the socket gives the lock up instead of blocking
/// shutdown.
pub struct AmqpPublisher {
    exchange: String,
    link: Mutex<Option<Link>>,
    closing: CancellationToken,
}

impl AmqpPublisher {
    /// Connect, enable publisher confirms, and declare the topology.
    pub async fn connect(settings: &BusSettings) -> Result<Self, AuthError> {
        let connection = Connection::connect(&settings.url, connection_properties())
            .await
            .map_err(setup("connect"))?;
        let channel = connection.create_channel().await.map_err(setup("open channel"))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(setup("enable confirms"))?;

        channel
            .exchange_declare(
                &settings.exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(setup("declare exchange"))?;

        channel
            .queue_declare(
                &settings.queue,
                QueueDeclareOptions { durable: true, ..Default::default() },
                single_slot_queue_args(),
            )
            .await
            .map_err(setup("declare queue"))?;

        channel
            .queue_bind(
                &settings.queue,
                &settings.exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(setup("bind queue"))?;

        info!(exchange = %settings.exchange, queue = %settings.queue, "bus publisher ready");
        Ok(Self {
            exchange: settings.exchange.clone(),
            link: Mutex::new(Some(Link { connection, channel })),
            closing: CancellationToken::new(),
        })
    }

    async fn publish_inner(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        // The lock covers only the frame write; waiting for the broker confirm
        // must not block close().
        let confirm = {
            let guard = tokio::select! {
                biased;
                _ = self.closing.cancelled() => return Err(PublishError::Closed),
                guard = self.link.lock() => guard,
            };
            let link = guard.as_ref().ok_or(PublishError::Closed)?;
            tokio::select! {
                biased;
                _ = self.closing.cancelled() => return Err(PublishError::Closed),
                sent = link.channel.basic_publish(
                    &self.exchange,
                    "",
                    BasicPublishOptions::default(),
                    &payload,
                    publish_properties(),
                ) => sent?,
            }
        };
        let confirmation = tokio::select! {
            biased;
            _ = self.closing.cancelled() => return Err(PublishError::Closed),
            confirmation = confirm => confirmation?,
        };
        if confirmation.is_nack() {
            return Err(PublishError::Nacked);
        }
        debug!(exchange = %self.exchange, bytes = payload.len(), "payload confirmed");
        Ok(())
    }

    async fn close_inner(&self) -> Result<(), PublishError> {
        self.closing.cancel();
        let Some(link) = self.link.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, link.channel.close(REPLY_SUCCESS, "shutdown"))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("failed to close bus channel: {e}"),
            Err(_) => warn!("bus channel close timed out"),
        }
        tokio::time::timeout(CLOSE_TIMEOUT, link.connection.close(REPLY_SUCCESS, "shutdown"))
            .await
            .map_err(|_| PublishError::CloseTimeout(CLOSE_TIMEOUT))??;
        info!("bus connection closed");
        Ok(())
    }
}

impl Publisher for AmqpPublisher {
    fn publish(
        &self,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        Box::pin(self.publish_inner(payload))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        Box::pin(self.close_inner())
    }
}

/// Run the connection's I/O on the process's tokio runtime.
fn connection_properties() -> ConnectionProperties {
    ConnectionProperties::default()
        .with_executor(tokio_executor_trait::Tokio::current())
        .with_reactor(tokio_reactor_trait::Tokio)
}

/// JSON content type, persisted across broker restarts.
pub fn publish_properties() -> BasicProperties {
    BasicProperties::default()
        .with_content_type(CONTENT_TYPE_JSON.into())
        .with_delivery_mode(DELIVERY_PERSISTENT)
}

fn setup(step: &'static str) -> impl FnOnce(lapin::Error) -> AuthError {
    move |source| AuthError::ConnectionSetup { step, source }
}

/// Queue arguments capping the backlog at one message, evicting the older.
pub fn single_slot_queue_args() -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(ShortString::from("x-max-length"), AMQPValue::LongInt(1));
    args.insert(
        ShortString::from("x-overflow"),
        AMQPValue::LongString(LongString::from("drop-head")),
    );
    args
}

#[cfg(test)]
#[path = "amqp_tests.rs"]
mod tests;
