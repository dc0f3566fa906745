// src/rabbitmq/acknowledger.rs

use tracing::debug;

use super::errors::Result;
use super::session::RabbitSession;
use super::transport::{AmqpLink, Connector};
use crate::message::DeliveryTag;

impl<C: Connector> RabbitSession<C> {
    /// Acknowledge exactly one delivery.
    ///
    /// The tag is not checked locally. An unknown or already-settled tag is a protocol error
    /// the broker raises by closing the channel, which shows up on a later call.
    pub async fn ack(&mut self, tag: DeliveryTag) -> Result<()> {
        self.require_link()?
            .ack(tag)
            .await
            .map_err(|status| status.report("ACK"))?;

        debug!(delivery_tag = tag.value(), "Acked");
        Ok(())
    }

    /// Reject exactly one delivery and return it to its queue.
    pub async fn nack(&mut self, tag: DeliveryTag) -> Result<()> {
        self.require_link()?
            .nack(tag, true)
            .await
            .map_err(|status| status.report("NACK"))?;

        debug!(delivery_tag = tag.value(), "Nacked, requeued");
        Ok(())
    }
}
