// src/rabbitmq/transport.rs
//
// Seam between the session core and the AMQP client library. The core only ever talks to
// these traits; `LapinConnector` is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures_lite::{future, StreamExt};
use lapin::{
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
        BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions,
        QueueDeleteOptions,
    },
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, Error as LapinError,
};
use tracing::debug;

use super::errors::{RabbitMQError, Result};
use super::status::{ReplyStatus, StatusResult};
use super::uri::ConnectionParameters;
use crate::config::SessionConfig;
use crate::message::{Delivery, DeliveryTag, OutboundMessage};

/// AMQP reply code for a normal close.
pub const REPLY_SUCCESS: u16 = 200;

/// Unacked deliveries the broker may push to one consumer.
pub const CONSUME_PREFETCH: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishConfirmation {
    /// Channel is not in confirm mode; the send was accepted locally.
    NotRequested,
    Acked,
    Nacked,
}

/// What one bounded wait on a consumer produced.
#[derive(Debug)]
pub enum SliceOutcome {
    Delivered(Delivery),
    TimedOut,
    Failed(ReplyStatus),
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Link: AmqpLink;

    /// Open the socket (TLS when requested) and log in.
    async fn open(&self, params: &ConnectionParameters, config: &SessionConfig) -> Result<Self::Link>;
}

/// An open, logged-in connection and its single channel.
#[async_trait]
pub trait AmqpLink: Send + Sync {
    type Consumer: DeliveryStream;

    /// Returns the channel number the library assigned.
    async fn open_channel(&mut self, confirm_publishes: bool) -> StatusResult<u16>;

    async fn close_channel(&mut self) -> StatusResult<()>;

    async fn close_connection(&mut self) -> StatusResult<()>;

    async fn queue_declare(&self, queue: &str) -> StatusResult<()>;

    async fn queue_delete(&self, queue: &str) -> StatusResult<()>;

    async fn publish(&self, message: OutboundMessage<'_>) -> StatusResult<PublishConfirmation>;

    async fn consume(&self, queue: &str) -> StatusResult<Self::Consumer>;

    async fn ack(&self, tag: DeliveryTag) -> StatusResult<()>;

    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> StatusResult<()>;
}

/// One registered consumer.
#[async_trait]
pub trait DeliveryStream: Send {
    /// Wait at most `slice` for the next delivery.
    async fn next_within(&mut self, slice: Duration) -> SliceOutcome;

    /// Cancel the consumer. Returns deliveries that reached the client before the cancel took
    /// effect but were never handed out; they are still unacked on the channel.
    async fn cancel(&mut self) -> StatusResult<Vec<Delivery>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LapinConnector;

#[async_trait]
impl Connector for LapinConnector {
    type Link = LapinLink;

    async fn open(&self, params: &ConnectionParameters, config: &SessionConfig) -> Result<LapinLink> {
        let uri = params.to_amqp_uri(config.frame_max, config.heartbeat);
        let properties = ConnectionProperties::default()
            .with_connection_name(config.connection_name.clone().into());

        debug!(
            frame_max = config.frame_max,
            heartbeat = config.heartbeat,
            tls = params.use_tls,
            "Opening connection to {}",
            params
        );

        Connection::connect_uri(uri, properties)
            .await
            .map(LapinLink::new)
            .map_err(|e| open_error(params, e))
    }
}

/// Socket failures are transport errors; anything after the socket is up failed the login.
fn open_error(params: &ConnectionParameters, error: LapinError) -> RabbitMQError {
    match error {
        LapinError::IOError(e) => {
            let socket = if params.use_tls { "TLS" } else { "TCP" };
            RabbitMQError::Transport(format!(
                "Error opening {} socket to {}:{}: {}",
                socket, params.host, params.port, e
            ))
        }
        e => RabbitMQError::broker("Login", e.into()),
    }
}

pub struct LapinLink {
    connection: Connection,
    channel: Option<Channel>,
    confirm_publishes: bool,
}

impl LapinLink {
    fn new(connection: Connection) -> Self {
        Self {
            connection,
            channel: None,
            confirm_publishes: false,
        }
    }

    fn channel(&self) -> StatusResult<&Channel> {
        self.channel
            .as_ref()
            .ok_or_else(|| ReplyStatus::Library("channel is not open".to_string()))
    }
}

#[async_trait]
impl AmqpLink for LapinLink {
    type Consumer = LapinConsumer;

    async fn open_channel(&mut self, confirm_publishes: bool) -> StatusResult<u16> {
        let channel = self.connection.create_channel().await?;

        channel
            .basic_qos(CONSUME_PREFETCH, BasicQosOptions::default())
            .await?;

        if confirm_publishes {
            debug!("Enabling confirm mode for channel {}", channel.id());
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await?;
        }

        let id = channel.id();
        self.channel = Some(channel);
        self.confirm_publishes = confirm_publishes;
        Ok(id)
    }

    async fn close_channel(&mut self) -> StatusResult<()> {
        let channel = self
            .channel
            .take()
            .ok_or_else(|| ReplyStatus::Library("channel is not open".to_string()))?;
        channel.close(REPLY_SUCCESS, "Closing channel").await?;
        Ok(())
    }

    async fn close_connection(&mut self) -> StatusResult<()> {
        self.connection
            .close(REPLY_SUCCESS, "Closing connection")
            .await?;
        Ok(())
    }

    async fn queue_declare(&self, queue: &str) -> StatusResult<()> {
        let options = QueueDeclareOptions {
            passive: false,
            durable: true,
            exclusive: false,
            auto_delete: false,
            nowait: false,
        };
        let declared = self
            .channel()?
            .queue_declare(queue, options, FieldTable::default())
            .await?;
        debug!(queue, messages = declared.message_count(), "Queue declared");
        Ok(())
    }

    async fn queue_delete(&self, queue: &str) -> StatusResult<()> {
        let options = QueueDeleteOptions {
            if_unused: false,
            if_empty: false,
            nowait: false,
        };
        let purged = self.channel()?.queue_delete(queue, options).await?;
        debug!(queue, messages = purged, "Queue deleted");
        Ok(())
    }

    async fn publish(&self, message: OutboundMessage<'_>) -> StatusResult<PublishConfirmation> {
        let properties = BasicProperties::default()
            .with_content_type(message.content_type().into())
            .with_delivery_mode(message.delivery_mode());
        let options = BasicPublishOptions {
            mandatory: false,
            immediate: false,
        };

        let confirm = self
            .channel()?
            .basic_publish("", message.queue, options, message.payload, properties)
            .await?;

        if !self.confirm_publishes {
            return Ok(PublishConfirmation::NotRequested);
        }

        Ok(match confirm.await? {
            Confirmation::Ack(_) => PublishConfirmation::Acked,
            Confirmation::Nack(_) => PublishConfirmation::Nacked,
            Confirmation::NotRequested => PublishConfirmation::NotRequested,
        })
    }

    async fn consume(&self, queue: &str) -> StatusResult<LapinConsumer> {
        let channel = self.channel()?.clone();
        let options = BasicConsumeOptions {
            no_local: false,
            no_ack: false,
            exclusive: false,
            nowait: false,
        };

        // Empty tag: the broker generates one.
        let consumer = channel
            .basic_consume(queue, "", options, FieldTable::default())
            .await?;

        Ok(LapinConsumer { channel, consumer })
    }

    async fn ack(&self, tag: DeliveryTag) -> StatusResult<()> {
        self.channel()?
            .basic_ack(tag.value(), BasicAckOptions { multiple: false })
            .await?;
        Ok(())
    }

    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> StatusResult<()> {
        let options = BasicNackOptions {
            multiple: false,
            requeue,
        };
        self.channel()?.basic_nack(tag.value(), options).await?;
        Ok(())
    }
}

pub struct LapinConsumer {
    channel: Channel,
    consumer: Consumer,
}

#[async_trait]
impl DeliveryStream for LapinConsumer {
    async fn next_within(&mut self, slice: Duration) -> SliceOutcome {
        match tokio::time::timeout(slice, self.consumer.next()).await {
            Err(_) => SliceOutcome::TimedOut,
            Ok(next) => slice_outcome(next.map(|result| result.map(into_delivery))),
        }
    }

    async fn cancel(&mut self) -> StatusResult<Vec<Delivery>> {
        let tag = self.consumer.tag();
        self.channel
            .basic_cancel(tag.as_str(), BasicCancelOptions::default())
            .await?;

        // cancel-ok is processed after every delivery the broker sent before it, so whatever
        // is left is already buffered and can be taken without waiting.
        let mut stranded = Vec::new();
        while let Some(Some(next)) = future::poll_once(self.consumer.next()).await {
            stranded.push(into_delivery(next?));
        }
        Ok(stranded)
    }
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    Delivery::new(delivery.delivery_tag, delivery.data)
}

/// Map one item of the consumer stream. The stream ends when the consumer is cancelled.
fn slice_outcome(next: Option<std::result::Result<Delivery, LapinError>>) -> SliceOutcome {
    match next {
        Some(Ok(delivery)) => SliceOutcome::Delivered(delivery),
        Some(Err(e)) => SliceOutcome::Failed(e.into()),
        None => SliceOutcome::Failed(ReplyStatus::Library(
            "consumer was cancelled by the broker".to_string(),
        )),
    }
}
