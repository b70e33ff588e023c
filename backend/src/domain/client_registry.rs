//! Registry binding caller-chosen client identifiers to realtime connections.
//!
//! The handshake has two steps: `initialize(client_id)` over HTTP creates an
//! unbound entry, then the client's WebSocket sends `register` with the same
//! identifier to bind its connection. Identifiers are untrusted and not
//! unique; a later `initialize` silently replaces an earlier entry.
//!
//! A connection is bound to at most one entry at a time, so a disconnect
//! removes exactly one entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use mockable::Clock;
use thiserror::Error;
use tracing::debug;

use super::ConnectionId;

/// Upper bound on client identifier length.
pub const MAX_CLIENT_ID_LEN: usize = 128;

/// Validation failures for [`ClientId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientIdError {
    #[error("clientId is required")]
    Empty,
    #[error("clientId must be at most {MAX_CLIENT_ID_LEN} bytes")]
    TooLong,
}

/// Caller-supplied client identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Trim and validate an identifier.
    ///
    /// # Examples
    /// ```
    /// use villagelink::domain::ClientId;
    ///
    /// assert_eq!(ClientId::new(" tab-42 ").unwrap().as_str(), "tab-42");
    /// assert!(ClientId::new("   ").is_err());
    /// ```
    pub fn new(value: impl AsRef<str>) -> Result<Self, ClientIdError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ClientIdError::Empty);
        }
        if trimmed.len() > MAX_CLIENT_ID_LEN {
            return Err(ClientIdError::TooLong);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRegistration {
    /// When the most recent `initialize` for this identifier happened.
    pub initialized_at: DateTime<Utc>,
    /// Realtime connection bound by `register`, if any.
    pub connection: Option<ConnectionId>,
}

/// Shared, lock-protected client registry.
pub struct ClientRegistry {
    entries: Mutex<HashMap<ClientId, ClientRegistration>>,
    clock: Arc<dyn Clock>,
}

impl ClientRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Create or replace the entry for `client_id`, unbound.
    pub fn initialize(&self, client_id: ClientId) -> ClientRegistration {
        let registration = ClientRegistration {
            initialized_at: self.clock.utc(),
            connection: None,
        };
        let previous = self.lock().insert(client_id.clone(), registration);
        if let Some(ClientRegistration {
            connection: Some(connection),
            ..
        }) = previous
        {
            debug!(
                client_id = %client_id,
                %connection,
                "client re-initialised; previous connection binding dropped"
            );
        }
        registration
    }

    /// Bind `connection` to an initialised entry.
    ///
    /// Unknown identifiers are ignored and `false` is returned. Binding a
    /// connection that already holds another entry moves the binding.
    pub fn register(&self, client_id: &ClientId, connection: ConnectionId) -> bool {
        let mut entries = self.lock();
        if !entries.contains_key(client_id) {
            return false;
        }
        for (id, entry) in entries.iter_mut() {
            if id != client_id && entry.connection == Some(connection) {
                entry.connection = None;
            }
        }
        if let Some(entry) = entries.get_mut(client_id) {
            entry.connection = Some(connection);
        }
        true
    }

    /// Remove the entry bound to `connection`, returning its identifier.
    pub fn unregister(&self, connection: ConnectionId) -> Option<ClientId> {
        let mut entries = self.lock();
        let client_id = entries
            .iter()
            .find(|(_, entry)| entry.connection == Some(connection))
            .map(|(id, _)| id.clone())?;
        entries.remove(&client_id);
        Some(client_id)
    }

    pub fn get(&self, client_id: &ClientId) -> Option<ClientRegistration> {
        self.lock().get(client_id).copied()
    }

    pub fn connection_for(&self, client_id: &ClientId) -> Option<ConnectionId> {
        self.get(client_id).and_then(|entry| entry.connection)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, ClientRegistration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
