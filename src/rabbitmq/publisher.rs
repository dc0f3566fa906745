// src/rabbitmq/publisher.rs

use tracing::{debug, error};

use super::errors::{RabbitMQError, Result};
use super::session::RabbitSession;
use super::transport::{AmqpLink, Connector, PublishConfirmation};
use crate::message::OutboundMessage;

impl<C: Connector> RabbitSession<C> {
    /// Send `payload` to `queue` through the default exchange as a persistent `text/plain`
    /// message.
    ///
    /// Without confirm mode success only means the transport accepted the frame; an
    /// unroutable message is dropped by the broker silently. With `confirm_publishes` the call
    /// waits for the broker's ack.
    pub async fn publish(&mut self, queue: &str, payload: &[u8]) -> Result<()> {
        let message = OutboundMessage::new(queue, payload);

        let confirmation = self
            .require_link()?
            .publish(message)
            .await
            .map_err(|status| status.report("Publish"))?;

        if confirmation == PublishConfirmation::Nacked {
            let err = RabbitMQError::PublishNacked;
            error!(queue, "{}", err);
            return Err(err);
        }

        debug!(queue, bytes = payload.len(), ?confirmation, "Published message");
        Ok(())
    }
}
