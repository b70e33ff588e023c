//! Shared WebSocket adapter state.

use std::sync::Arc;

use crate::domain::RelayContext;

/// Dependency bundle for the `/ws` entry point and its sessions.
#[derive(Clone)]
pub struct WsState {
    pub relay: Arc<RelayContext>,
}

impl WsState {
    pub fn new(relay: Arc<RelayContext>) -> Self {
        Self { relay }
    }
}
