// src/rabbitmq/consumer.rs

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::errors::Result;
use super::session::RabbitSession;
use super::transport::{AmqpLink, Connector, DeliveryStream, SliceOutcome};
use crate::message::Delivery;

/// How many empty polling slices `read_message` tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutBudget {
    /// Poll until a message arrives or something fails.
    Unbounded,
    /// Give up after this many empty slices. At least one slice is always polled.
    Slices(u32),
}

impl From<Option<u32>> for TimeoutBudget {
    fn from(timeout: Option<u32>) -> Self {
        match timeout {
            Some(slices) => TimeoutBudget::Slices(slices),
            None => TimeoutBudget::Unbounded,
        }
    }
}

/// How a read ended without failing. Failures are returned as `Err`.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Delivered(Delivery),
    TimedOut,
    /// The cancellation token fired between two slices.
    Cancelled,
}

impl ReadOutcome {
    pub fn into_delivery(self) -> Option<Delivery> {
        match self {
            ReadOutcome::Delivered(delivery) => Some(delivery),
            ReadOutcome::TimedOut | ReadOutcome::Cancelled => None,
        }
    }
}

impl<C: Connector> RabbitSession<C> {
    /// Register a consumer on `queue` and wait for one message.
    ///
    /// The wait is cut into slices of `poll_slice_ms`. Between slices the token is checked,
    /// so cancellation is honored at most one slice late. Each empty slice spends one unit of
    /// a bounded budget. The returned delivery is not acked; settle it with [`Self::ack`] or
    /// [`Self::nack`].
    ///
    /// The consumer is cancelled again before returning, whatever the outcome. Deliveries that
    /// reached it after the last slice are nacked with requeue so later reads still see them.
    pub async fn read_message(
        &mut self,
        queue: &str,
        timeout: TimeoutBudget,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        let slice = self.config.poll_slice();

        let mut consumer = self
            .require_link()?
            .consume(queue)
            .await
            .map_err(|status| status.report("Consuming"))?;
        debug!(queue, ?timeout, ?slice, "Consumer registered");

        let outcome = poll(&mut consumer, queue, timeout, slice, cancel).await;
        self.release(&mut consumer, queue).await;
        outcome
    }

    /// Best effort: failures here are logged and never change the read's outcome.
    async fn release<S: DeliveryStream>(&self, consumer: &mut S, queue: &str) {
        let stranded = match consumer.cancel().await {
            Ok(stranded) => stranded,
            Err(status) => {
                warn!(queue, "Failed to cancel consumer: {}", status);
                return;
            }
        };

        let Some(link) = self.link.as_ref() else {
            return;
        };
        for delivery in stranded {
            let tag = delivery.delivery_tag;
            match link.nack(tag, true).await {
                Ok(()) => debug!(queue, delivery_tag = tag.value(), "Requeued late delivery"),
                Err(status) => warn!(
                    queue,
                    delivery_tag = tag.value(),
                    "Failed to requeue late delivery: {}",
                    status
                ),
            }
        }
    }
}

async fn poll<S: DeliveryStream>(
    consumer: &mut S,
    queue: &str,
    mut budget: TimeoutBudget,
    slice: Duration,
    cancel: &CancellationToken,
) -> Result<ReadOutcome> {
    loop {
        if cancel.is_cancelled() {
            info!(queue, "Read cancelled");
            return Ok(ReadOutcome::Cancelled);
        }

        match consumer.next_within(slice).await {
            SliceOutcome::Delivered(delivery) => {
                debug!(
                    queue,
                    delivery_tag = delivery.delivery_tag.value(),
                    bytes = delivery.body.len(),
                    "Received message"
                );
                return Ok(ReadOutcome::Delivered(delivery));
            }
            SliceOutcome::Failed(status) => return Err(status.report("consume.message")),
            SliceOutcome::TimedOut => match &mut budget {
                TimeoutBudget::Unbounded => trace!(queue, "No message yet"),
                TimeoutBudget::Slices(left) => {
                    *left = left.saturating_sub(1);
                    trace!(queue, slices = *left, "No message yet");
                    if *left == 0 {
                        info!(queue, "Timed out waiting for a message");
                        return Ok(ReadOutcome::TimedOut);
                    }
                }
            },
        }
    }
}
