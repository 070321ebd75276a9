// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publisher against a live RabbitMQ. Needs `RABBITMQ_URL`; run with
//! `cargo test --test amqp -- --ignored`.

use lapin::options::{BasicGetOptions, ExchangeDeleteOptions, QueueDeleteOptions};
use lapin::{Connection, ConnectionProperties};

use r6auth::publish::{AmqpPublisher, BusSettings, Publisher};

fn bus_settings() -> anyhow::Result<BusSettings> {
    let url = std::env::var("RABBITMQ_URL")?;
    let suffix = std::process::id();
    Ok(BusSettings {
        url,
        exchange: format!("r6index-test-{suffix}"),
        queue: format!("auth-test-{suffix}"),
    })
}

#[tokio::test]
#[ignore = "needs a RabbitMQ broker at RABBITMQ_URL"]
async fn newest_payload_evicts_older_and_close_is_idempotent() -> anyhow::Result<()> {
    let settings = bus_settings()?;
    let publisher = AmqpPublisher::connect(&settings).await?;

    publisher.publish(br#"{"ticket":"old"}"#.to_vec()).await?;
    publisher.publish(br#"{"ticket":"new"}"#.to_vec()).await?;

    let consumer = Connection::connect(&settings.url, ConnectionProperties::default()).await?;
    let channel = consumer.create_channel().await?;
    let first = channel
        .basic_get(&settings.queue, BasicGetOptions { no_ack: true })
        .await?
        .ok_or_else(|| anyhow::anyhow!("queue is empty"))?;
    assert_eq!(first.delivery.data, br#"{"ticket":"new"}"#);
    let props = &first.delivery.properties;
    assert_eq!(props.content_type().as_ref().map(|c| c.as_str()), Some("application/json"));
    assert_eq!(*props.delivery_mode(), Some(2));
    assert!(channel.basic_get(&settings.queue, BasicGetOptions { no_ack: true }).await?.is_none());

    publisher.close().await?;
    publisher.close().await?;
    let after_close = publisher.publish(b"{}".to_vec()).await;
    assert!(after_close.is_err());

    channel.queue_delete(&settings.queue, QueueDeleteOptions::default()).await?;
    channel.exchange_delete(&settings.exchange, ExchangeDeleteOptions::default()).await?;
    consumer.close(200, "done").await?;
    Ok(())
}
