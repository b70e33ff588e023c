//! Driven port for pushing events onto one realtime connection.
//!
//! The broadcast hub calls [`ConnectionSink::deliver`] while holding its
//! connection-set lock, so implementations must not block: the WebSocket
//! adapter enqueues onto the session's outbound channel and returns.

use std::sync::Arc;

use crate::domain::OutboundEvent;

use super::define_port_error;

define_port_error! {
    /// A single connection could not accept an event.
    pub enum DeliveryError {
        /// The connection has gone away or is mid-disconnect.
        Closed => "connection closed",
    }
}

/// Non-blocking, order-preserving outbound queue of one connection.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionSink: Send + Sync {
    /// Enqueue `event` after everything previously delivered.
    fn deliver(&self, event: Arc<OutboundEvent>) -> Result<(), DeliveryError>;
}
