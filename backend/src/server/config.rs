//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use villagelink::domain::{DEFAULT_POLL_INTERVAL, RelayContext};
use villagelink::inbound::http::health::{DatabaseMode, ServiceInventory};

/// Everything `create_server` needs besides the health state.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) relay: Arc<RelayContext>,
    pub(crate) database: DatabaseMode,
    pub(crate) poll_interval: Duration,
}

impl ServerConfig {
    #[must_use]
    pub fn new(bind_addr: SocketAddr, relay: Arc<RelayContext>) -> Self {
        Self {
            bind_addr,
            relay,
            database: DatabaseMode::Fixture,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Record that a database pool backs the change source.
    #[must_use]
    pub fn with_database(mut self, database: DatabaseMode) -> Self {
        self.database = database;
        self
    }

    /// Poll interval reported by `GET /health`.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    #[must_use]
    pub fn relay(&self) -> &Arc<RelayContext> {
        &self.relay
    }

    /// Static service facts for the health report.
    #[must_use]
    pub fn inventory(&self) -> ServiceInventory {
        ServiceInventory {
            database: self.database,
            poll_interval: self.poll_interval,
            hub: Arc::clone(self.relay.hub()),
        }
    }
}
