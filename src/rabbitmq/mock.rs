// In-memory transport for unit tests. Every broker call is recorded so tests can assert
// exactly which round trips happened.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::errors::{RabbitMQError, Result};
use super::status::{ReplyStatus, StatusResult};
use super::transport::{AmqpLink, Connector, DeliveryStream, PublishConfirmation, SliceOutcome};
use super::uri::ConnectionParameters;
use crate::config::SessionConfig;
use crate::message::{Delivery, DeliveryTag, OutboundMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open { host: String, tls: bool },
    OpenChannel { confirm: bool },
    CloseChannel,
    CloseConnection,
    Declare(String),
    Delete(String),
    Publish { queue: String, payload: Vec<u8> },
    Consume(String),
    Poll,
    CancelConsumer,
    Ack(u64),
    Nack { tag: u64, requeue: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Open,
    OpenChannel,
    CloseChannel,
    CloseConnection,
    Declare,
    Delete,
    Publish,
    Consume,
    Ack,
    Nack,
}

/// What a single poll of the mock consumer yields.
#[derive(Debug, Clone)]
pub enum Slice {
    Empty,
    Deliver(Delivery),
    Fail(ReplyStatus),
}

#[derive(Debug, Default)]
pub struct MockBroker {
    pub calls: Vec<Call>,
    failures: HashMap<Step, ReplyStatus>,
    slices: VecDeque<Slice>,
    buffered: Vec<Delivery>,
    confirmation: Option<PublishConfirmation>,
}

impl MockBroker {
    fn fail_at(&mut self, step: Step) -> StatusResult<()> {
        match self.failures.get(&step) {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockConnector {
    broker: Arc<Mutex<MockBroker>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, step: Step, status: ReplyStatus) {
        self.broker.lock().unwrap().failures.insert(step, status);
    }

    pub fn clear_failures(&self) {
        self.broker.lock().unwrap().failures.clear();
    }

    /// Queue up poll results; once exhausted every poll times out.
    pub fn script(&self, slices: impl IntoIterator<Item = Slice>) {
        self.broker.lock().unwrap().slices.extend(slices);
    }

    /// Deliveries that arrive after the last poll and are still buffered when the consumer
    /// is cancelled.
    pub fn buffer_at_cancel(&self, deliveries: impl IntoIterator<Item = Delivery>) {
        self.broker.lock().unwrap().buffered.extend(deliveries);
    }

    pub fn confirm_with(&self, confirmation: PublishConfirmation) {
        self.broker.lock().unwrap().confirmation = Some(confirmation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.broker.lock().unwrap().calls.clone()
    }

    pub fn polls(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Poll).count()
    }

    pub fn reset_calls(&self) {
        self.broker.lock().unwrap().calls.clear();
    }

    fn record(&self, call: Call, step: Option<Step>) -> StatusResult<()> {
        let mut broker = self.broker.lock().unwrap();
        broker.calls.push(call);
        match step {
            Some(step) => broker.fail_at(step),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Link = MockLink;

    async fn open(&self, params: &ConnectionParameters, _config: &SessionConfig) -> Result<MockLink> {
        let call = Call::Open {
            host: params.host.clone(),
            tls: params.use_tls,
        };
        self.record(call, Some(Step::Open))
            .map_err(|status| RabbitMQError::broker("Login", status))?;
        Ok(MockLink {
            connector: self.clone(),
        })
    }
}

pub struct MockLink {
    connector: MockConnector,
}

#[async_trait]
impl AmqpLink for MockLink {
    type Consumer = MockConsumer;

    async fn open_channel(&mut self, confirm_publishes: bool) -> StatusResult<u16> {
        self.connector.record(
            Call::OpenChannel {
                confirm: confirm_publishes,
            },
            Some(Step::OpenChannel),
        )?;
        Ok(1)
    }

    async fn close_channel(&mut self) -> StatusResult<()> {
        self.connector.record(Call::CloseChannel, Some(Step::CloseChannel))
    }

    async fn close_connection(&mut self) -> StatusResult<()> {
        self.connector
            .record(Call::CloseConnection, Some(Step::CloseConnection))
    }

    async fn queue_declare(&self, queue: &str) -> StatusResult<()> {
        self.connector
            .record(Call::Declare(queue.to_string()), Some(Step::Declare))
    }

    async fn queue_delete(&self, queue: &str) -> StatusResult<()> {
        self.connector
            .record(Call::Delete(queue.to_string()), Some(Step::Delete))
    }

    async fn publish(&self, message: OutboundMessage<'_>) -> StatusResult<PublishConfirmation> {
        let call = Call::Publish {
            queue: message.queue.to_string(),
            payload: message.payload.to_vec(),
        };
        self.connector.record(call, Some(Step::Publish))?;
        let confirmation = self.connector.broker.lock().unwrap().confirmation;
        Ok(confirmation.unwrap_or(PublishConfirmation::NotRequested))
    }

    async fn consume(&self, queue: &str) -> StatusResult<MockConsumer> {
        self.connector
            .record(Call::Consume(queue.to_string()), Some(Step::Consume))?;
        Ok(MockConsumer {
            connector: self.connector.clone(),
        })
    }

    async fn ack(&self, tag: DeliveryTag) -> StatusResult<()> {
        self.connector.record(Call::Ack(tag.value()), Some(Step::Ack))
    }

    async fn nack(&self, tag: DeliveryTag, requeue: bool) -> StatusResult<()> {
        let call = Call::Nack {
            tag: tag.value(),
            requeue,
        };
        self.connector.record(call, Some(Step::Nack))
    }
}

pub struct MockConsumer {
    connector: MockConnector,
}

#[async_trait]
impl DeliveryStream for MockConsumer {
    async fn next_within(&mut self, slice: Duration) -> SliceOutcome {
        let next = {
            let mut broker = self.connector.broker.lock().unwrap();
            broker.calls.push(Call::Poll);
            broker.slices.pop_front().unwrap_or(Slice::Empty)
        };

        match next {
            Slice::Deliver(delivery) => SliceOutcome::Delivered(delivery),
            Slice::Fail(status) => SliceOutcome::Failed(status),
            Slice::Empty => {
                tokio::time::sleep(slice).await;
                SliceOutcome::TimedOut
            }
        }
    }

    async fn cancel(&mut self) -> StatusResult<Vec<Delivery>> {
        let mut broker = self.connector.broker.lock().unwrap();
        broker.calls.push(Call::CancelConsumer);
        Ok(std::mem::take(&mut broker.buffered))
    }
}
