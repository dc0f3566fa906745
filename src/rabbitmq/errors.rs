// src/rabbitmq/errors.rs

use thiserror::Error;

use super::status::ReplyStatus;

#[derive(Debug, Error)]
pub enum RabbitMQError {
    #[error("Already connected to rabbitmq, close connection first")]
    AlreadyConnected,

    #[error("No open connection to rabbitmq")]
    NotConnected,

    #[error("A rabbitmq session is already live in this process")]
    SessionLive,

    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid AMQP URI: {0}")]
    InvalidUri(String),

    #[error("{0}")]
    Transport(String),

    #[error("{context}: {status}")]
    Broker {
        context: &'static str,
        status: ReplyStatus,
    },

    #[error("Publish was negatively acknowledged by the broker")]
    PublishNacked,
}

// Custom Result type for RabbitMQ operations
pub type Result<T> = std::result::Result<T, RabbitMQError>;

impl RabbitMQError {
    pub fn broker(context: &'static str, status: ReplyStatus) -> Self {
        RabbitMQError::Broker { context, status }
    }
}
