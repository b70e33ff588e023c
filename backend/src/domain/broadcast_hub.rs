//! Fan-out of named events to every live realtime connection.
//!
//! Delivery happens while the connection-set read lock is held, and each
//! sink only enqueues. Two publishes from one task therefore reach every
//! connection in the order they were issued.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::debug;

use super::ports::ConnectionSink;
use super::{ConnectionId, EventName, OutboundEvent, Row, TableName};

type Connections = HashMap<ConnectionId, Arc<dyn ConnectionSink>>;

/// Set of live connections plus the broadcast primitive.
#[derive(Default)]
pub struct BroadcastHub {
    connections: RwLock<Connections>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection. Replaces any sink already stored under `id`.
    pub fn add(&self, id: ConnectionId, sink: Arc<dyn ConnectionSink>) {
        self.write().insert(id, sink);
    }

    /// Stop tracking a connection; `false` when it was not present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.write().remove(&id).is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.read().len()
    }

    /// Send `data` as `event` to every connection.
    ///
    /// Returns how many connections accepted the event. Connections whose
    /// sink rejects it are skipped; zero connections is not an error.
    pub fn publish(&self, event: &EventName, data: Value) -> usize {
        self.publish_event(OutboundEvent::new(event.clone(), data))
    }

    /// Send a pre-built event to every connection.
    pub fn publish_event(&self, event: OutboundEvent) -> usize {
        let event = Arc::new(event);
        let connections = self.read();
        let mut delivered = 0;
        for (id, sink) in connections.iter() {
            match sink.deliver(Arc::clone(&event)) {
                Ok(()) => delivered += 1,
                Err(error) => debug!(
                    connection = %id,
                    event = %event.event,
                    %error,
                    "skipping connection during broadcast"
                ),
            }
        }
        delivered
    }

    /// Broadcast a `refreshData` snapshot for `table`.
    pub fn publish_snapshot(&self, table: &TableName, rows: Vec<Row>) -> usize {
        self.publish_event(OutboundEvent::snapshot(table, rows))
    }

    /// Forget every connection, returning how many were dropped.
    ///
    /// Dropping the sinks closes each session's outbound channel, which ends
    /// the session loop.
    pub fn close_all(&self) -> usize {
        let mut connections = self.write();
        let count = connections.len();
        connections.clear();
        count
    }

    fn read(&self) -> RwLockReadGuard<'_, Connections> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Connections> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
