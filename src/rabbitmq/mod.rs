// src/rabbitmq/mod.rs
// Single-connection, single-channel RabbitMQ session

pub mod errors;
pub mod status;
pub mod transport;
pub mod uri;

mod acknowledger;
mod connection;
mod consumer;
mod publisher;
mod queue;
mod session;

#[cfg(test)]
pub(crate) mod mock;

// Re-export specific items to simplify imports elsewhere
pub use consumer::{ReadOutcome, TimeoutBudget};
pub use errors::{RabbitMQError, Result};
pub use session::RabbitSession;
pub use status::{ReplyStatus, StatusResult};
pub use transport::{AmqpLink, Connector, DeliveryStream, LapinConnector, PublishConfirmation, SliceOutcome};
pub use uri::ConnectionParameters;
