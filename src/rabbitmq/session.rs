// src/rabbitmq/session.rs

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error};

use super::errors::{RabbitMQError, Result};
use super::transport::{Connector, LapinConnector};
use crate::config::SessionConfig;

static SESSION_LIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide claim on the single session slot, released on drop.
#[derive(Debug)]
struct SessionGuard;

impl SessionGuard {
    fn acquire() -> Result<Self> {
        SESSION_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionGuard)
            .map_err(|_| RabbitMQError::SessionLive)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSION_LIVE.store(false, Ordering::Release);
    }
}

/// The one connection/channel pair this process talks to the broker through.
///
/// At most one `RabbitSession` exists per process; [`RabbitSession::new`] fails with
/// [`RabbitMQError::SessionLive`] while another is alive. Every operation takes `&mut self`,
/// so calls run one at a time to completion.
///
/// `link` is `Some` exactly when the session is connected. A failed connect never leaves a
/// half-open link behind.
pub struct RabbitSession<C: Connector = LapinConnector> {
    pub(crate) connector: C,
    pub(crate) config: SessionConfig,
    pub(crate) link: Option<C::Link>,
    _guard: SessionGuard,
}

impl RabbitSession<LapinConnector> {
    pub fn lapin(config: SessionConfig) -> Result<Self> {
        Self::new(LapinConnector, config)
    }
}

impl<C: Connector> RabbitSession<C> {
    pub fn new(connector: C, config: SessionConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RabbitMQError::InvalidConfig(e.to_string()))
            .inspect_err(|e| error!("{}", e))?;
        let guard = SessionGuard::acquire().inspect_err(|e| error!("{}", e))?;
        debug!(?config, "Session created");

        Ok(Self {
            connector,
            config,
            link: None,
            _guard: guard,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// The open link, or a reported `NotConnected` when there is none.
    pub(crate) fn require_link(&self) -> Result<&C::Link> {
        self.link.as_ref().ok_or_else(|| {
            let err = RabbitMQError::NotConnected;
            error!("{}", err);
            err
        })
    }
}
