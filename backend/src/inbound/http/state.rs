//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and only see the notify port and
//! the client registry, so they stay testable without a database.

use std::sync::Arc;

use crate::domain::ClientRegistry;
use crate::domain::ports::ChangeNotifier;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub notifier: Arc<dyn ChangeNotifier>,
    pub registry: Arc<ClientRegistry>,
}

impl HttpState {
    pub fn new(notifier: Arc<dyn ChangeNotifier>, registry: Arc<ClientRegistry>) -> Self {
        Self { notifier, registry }
    }
}
