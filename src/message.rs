use std::fmt;

/// Content type stamped on every outbound message.
pub const CONTENT_TYPE: &str = "text/plain";

/// AMQP delivery-mode value for messages that survive a broker restart.
pub const PERSISTENT: u8 = 2;

/// Broker-assigned handle for one delivered message, scoped to the channel it arrived on.
///
/// The value is never interpreted locally; it only travels back to the broker in an ack/nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryTag(pub u64);

impl DeliveryTag {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeliveryTag {
    fn from(tag: u64) -> Self {
        DeliveryTag(tag)
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message handed out by `read_message`; pass its tag to `ack` or `nack` exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: DeliveryTag,
    pub body: Vec<u8>,
}

impl Delivery {
    pub fn new(delivery_tag: u64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag: DeliveryTag(delivery_tag),
            body: body.into(),
        }
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One publish: the default exchange routes it to `queue`.
#[derive(Debug, Clone, Copy)]
pub struct OutboundMessage<'a> {
    pub queue: &'a str,
    pub payload: &'a [u8],
}

impl<'a> OutboundMessage<'a> {
    pub fn new(queue: &'a str, payload: &'a [u8]) -> Self {
        Self { queue, payload }
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    pub fn delivery_mode(&self) -> u8 {
        PERSISTENT
    }
}
