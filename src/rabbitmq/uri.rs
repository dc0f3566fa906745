// src/rabbitmq/uri.rs

use std::fmt;

use lapin::auth::SASLMechanism;
use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};

use super::errors::{RabbitMQError, Result};

/// Where and how to connect, parsed once from an `amqp://` or `amqps://` URI.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub user: String,
    pub password: String,
    pub use_tls: bool,
}

impl ConnectionParameters {
    pub fn parse(uri: &str) -> Result<Self> {
        let parsed: AMQPUri = uri.parse().map_err(RabbitMQError::InvalidUri)?;

        Ok(Self {
            host: parsed.authority.host,
            port: parsed.authority.port,
            vhost: parsed.vhost,
            user: parsed.authority.userinfo.username,
            password: parsed.authority.userinfo.password,
            use_tls: matches!(parsed.scheme, AMQPScheme::AMQPS),
        })
    }

    /// Builds the URI lapin connects with: SASL PLAIN plus the given tuning.
    pub fn to_amqp_uri(&self, frame_max: u32, heartbeat: u16) -> AMQPUri {
        let mut query = AMQPQueryString::default();
        query.frame_max = Some(frame_max);
        query.heartbeat = Some(heartbeat);
        query.auth_mechanism = Some(SASLMechanism::Plain);

        AMQPUri {
            scheme: if self.use_tls {
                AMQPScheme::AMQPS
            } else {
                AMQPScheme::AMQP
            },
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            query,
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .field("user", &self.user)
            .field("password", &"***")
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl fmt::Display for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.use_tls { "amqps" } else { "amqp" };
        write!(f, "{}://{}@{}:{}/{}", scheme, self.user, self.host, self.port, self.vhost)
    }
}
