//! Channel-backed [`ConnectionSink`] for one WebSocket session.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::domain::OutboundEvent;
use crate::domain::ports::{ConnectionSink, DeliveryError};

/// Enqueues events for the session task, which writes them to the socket in
/// arrival order.
pub struct ChannelSink {
    tx: UnboundedSender<Arc<OutboundEvent>>,
}

impl ChannelSink {
    /// Sink plus the receiver the session drains.
    pub fn pair() -> (Self, UnboundedReceiver<Arc<OutboundEvent>>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ConnectionSink for ChannelSink {
    fn deliver(&self, event: Arc<OutboundEvent>) -> Result<(), DeliveryError> {
        self.tx.send(event).map_err(|_| DeliveryError::closed())
    }
}
