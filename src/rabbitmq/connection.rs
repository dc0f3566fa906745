// src/rabbitmq/connection.rs

use tracing::{error, info, warn};

use super::errors::{RabbitMQError, Result};
use super::session::RabbitSession;
use super::transport::{AmqpLink, Connector};
use super::uri::ConnectionParameters;

impl<C: Connector> RabbitSession<C> {
    /// Open the connection and its channel.
    ///
    /// Any failing step abandons the sequence and leaves the session disconnected; broker-side
    /// steps that already completed are not rolled back.
    pub async fn connect(&mut self, uri: &str) -> Result<()> {
        if self.link.is_some() {
            let err = RabbitMQError::AlreadyConnected;
            error!("{}", err);
            return Err(err);
        }

        let params = ConnectionParameters::parse(uri).inspect_err(|e| error!("{}", e))?;
        info!("Connecting to RabbitMQ at {}", params);

        let mut link = self
            .connector
            .open(&params, &self.config)
            .await
            .inspect_err(|e| error!("{}", e))?;

        let channel_id = link
            .open_channel(self.config.confirm_publishes)
            .await
            .map_err(|status| status.report("Open channel"))?;

        info!(
            channel = channel_id,
            confirm = self.config.confirm_publishes,
            "Connected to RabbitMQ"
        );
        self.link = Some(link);
        Ok(())
    }

    /// Close the channel, then the connection.
    ///
    /// The session is marked disconnected before any broker call, so a failed close still
    /// allows a later `connect`.
    pub async fn close(&mut self) -> Result<()> {
        let mut link = match self.link.take() {
            Some(link) => link,
            None => {
                let err = RabbitMQError::NotConnected;
                error!("{}", err);
                return Err(err);
            }
        };

        link.close_channel()
            .await
            .map_err(|status| status.report("Closing channel"))?;

        link.close_connection()
            .await
            .map_err(|status| status.report("Closing connection"))?;

        drop(link);
        info!("Closed RabbitMQ connection");
        Ok(())
    }
}

impl<C: Connector> Drop for RabbitSession<C> {
    fn drop(&mut self) {
        if self.link.is_some() {
            warn!(
                "Session dropped while connected; the connection stays open until the broker \
                 closes it or the process exits"
            );
        }
    }
}
