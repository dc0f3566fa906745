// src/rabbitmq/queue.rs

use tracing::info;

use super::errors::Result;
use super::session::RabbitSession;
use super::transport::{AmqpLink, Connector};

impl<C: Connector> RabbitSession<C> {
    /// Declare a durable, shared, non-auto-delete queue. Succeeds if it already exists with
    /// the same parameters.
    pub async fn create_queue(&mut self, name: &str) -> Result<()> {
        self.require_link()?
            .queue_declare(name)
            .await
            .map_err(|status| status.report("queue.declare"))?;

        info!(queue = name, "Queue declared");
        Ok(())
    }

    /// Delete a queue whether or not it is empty or in use.
    pub async fn destroy_queue(&mut self, name: &str) -> Result<()> {
        self.require_link()?
            .queue_delete(name)
            .await
            .map_err(|status| status.report("queue.delete"))?;

        info!(queue = name, "Queue deleted");
        Ok(())
    }
}
