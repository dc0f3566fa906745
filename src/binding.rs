// src/binding.rs
//
// Blocking, boolean facade for host-language adapters. Each call runs the async core to
// completion on a private current-thread runtime. Failures were already reported on the
// tracing stream by the core, so nothing is logged here.

use anyhow::{Context, Result};
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::rabbitmq::{Connector, LapinConnector, RabbitSession};

pub struct RabbitMq<C: Connector = LapinConnector> {
    session: RabbitSession<C>,
    runtime: Runtime,
}

impl RabbitMq<LapinConnector> {
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_connector(LapinConnector, config)
    }
}

impl<C: Connector> RabbitMq<C> {
    pub fn with_connector(connector: C, config: SessionConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start the session runtime")?;
        let session = RabbitSession::new(connector, config)?;
        Ok(Self { session, runtime })
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn connect(&mut self, uri: &str) -> bool {
        self.runtime.block_on(self.session.connect(uri)).is_ok()
    }

    pub fn close(&mut self) -> bool {
        self.runtime.block_on(self.session.close()).is_ok()
    }

    pub fn create_queue(&mut self, name: &str) -> bool {
        self.runtime.block_on(self.session.create_queue(name)).is_ok()
    }

    pub fn destroy_queue(&mut self, name: &str) -> bool {
        self.runtime.block_on(self.session.destroy_queue(name)).is_ok()
    }

    pub fn publish(&mut self, queue: &str, payload: &str) -> bool {
        self.runtime
            .block_on(self.session.publish(queue, payload.as_bytes()))
            .is_ok()
    }

    /// `None` timeout waits until a message arrives. Ctrl-C interrupts the wait at the next
    /// slice boundary.
    pub fn read_message(&mut self, queue: &str, timeout: Option<u32>) -> Option<(u64, String)> {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        let watcher = self.runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });

        let delivery = self.read_message_with(queue, timeout, &cancel);
        watcher.abort();
        delivery
    }

    /// Like [`Self::read_message`], with the caller owning cancellation.
    pub fn read_message_with(
        &mut self,
        queue: &str,
        timeout: Option<u32>,
        cancel: &CancellationToken,
    ) -> Option<(u64, String)> {
        let outcome = self
            .runtime
            .block_on(self.session.read_message(queue, timeout.into(), cancel))
            .ok()?;

        outcome
            .into_delivery()
            .map(|delivery| (delivery.delivery_tag.value(), delivery.body_text()))
    }

    pub fn ack(&mut self, delivery_tag: u64) -> bool {
        self.runtime
            .block_on(self.session.ack(delivery_tag.into()))
            .is_ok()
    }

    pub fn nack(&mut self, delivery_tag: u64) -> bool {
        self.runtime
            .block_on(self.session.nack(delivery_tag.into()))
            .is_ok()
    }
}
