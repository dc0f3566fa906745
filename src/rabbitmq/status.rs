// src/rabbitmq/status.rs
//
// Uniform outcome for every broker/library reply. Each component turns whatever the
// transport hands back into a `ReplyStatus` and reports it through `check`.

use std::fmt;

use lapin::protocol::AMQPErrorKind;
use lapin::Error as LapinError;
use tracing::error;

use super::errors::RabbitMQError;

/// Result of a single broker call as seen through the transport seam.
pub type StatusResult<T> = std::result::Result<T, ReplyStatus>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The call completed normally.
    Normal,
    /// The library expected a reply and none arrived.
    Missing,
    /// Client-library failure (I/O, framing, invalid state).
    Library(String),
    /// The broker closed the connection (hard error).
    ConnectionClosed { code: u16, text: String },
    /// The broker closed the channel (soft error).
    ChannelClosed { code: u16, text: String },
}

impl ReplyStatus {
    pub fn is_normal(&self) -> bool {
        matches!(self, ReplyStatus::Normal)
    }

    /// Report a non-normal status on the diagnostic stream and convert it to pass/fail.
    pub fn check(&self, context: &str) -> bool {
        if self.is_normal() {
            return true;
        }
        error!("{}: {}", context, self);
        false
    }

    /// Report the status and turn it into the error returned to the caller.
    pub fn report(self, context: &'static str) -> RabbitMQError {
        self.check(context);
        RabbitMQError::broker(context, self)
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyStatus::Normal => write!(f, "normal"),
            ReplyStatus::Missing => write!(f, "missing RPC reply type!"),
            ReplyStatus::Library(text) => write!(f, "{}", text),
            ReplyStatus::ConnectionClosed { code, text } => {
                write!(f, "server connection error {}, message: {}", code, text)
            }
            ReplyStatus::ChannelClosed { code, text } => {
                write!(f, "server channel error {}, message: {}", code, text)
            }
        }
    }
}

impl From<LapinError> for ReplyStatus {
    fn from(error: LapinError) -> Self {
        match error {
            LapinError::ProtocolError(amqp_error) => {
                let code = amqp_error.get_id();
                let text = amqp_error.get_message().as_str().to_owned();
                match amqp_error.kind() {
                    AMQPErrorKind::Hard(_) => ReplyStatus::ConnectionClosed { code, text },
                    AMQPErrorKind::Soft(_) => ReplyStatus::ChannelClosed { code, text },
                }
            }
            LapinError::IOError(io_error) => ReplyStatus::Library(io_error.to_string()),
            other => ReplyStatus::Library(other.to_string()),
        }
    }
}
