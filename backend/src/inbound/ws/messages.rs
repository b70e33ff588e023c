//! Wire-level message definitions for the WebSocket adapter.
//!
//! Every frame in both directions is JSON text `{"event": name, "data": ...}`.
//! Clients send one event, `register`, whose payload is either
//! `{"clientId": "..."}` or the bare identifier string.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::domain::{
    ClientId, ClientIdError, ERROR_EVENT, EventName, OutboundEvent, REGISTERED_EVENT,
};

/// Event name of the registration half of the handshake.
pub const REGISTER_EVENT: &str = "register";

#[derive(Debug, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegisterPayload {
    Bare(String),
    Object {
        #[serde(rename = "clientId", alias = "client_id")]
        client_id: Option<String>,
    },
}

/// A decoded client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Register(ClientId),
    /// Any event the relay does not handle.
    Other(String),
}

/// Reasons a text frame cannot be decoded.
#[derive(Debug, Error)]
pub enum ClientMessageError {
    /// Not a `{"event", "data"}` JSON frame. The session closes.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// `register` without a usable client identifier. The session replies
    /// with an `error` event and stays open.
    #[error("invalid register payload: {0}")]
    InvalidRegister(#[from] ClientIdError),
}

impl ClientMessage {
    /// Decode one text frame.
    ///
    /// # Examples
    /// ```
    /// use villagelink::inbound::ws::messages::ClientMessage;
    ///
    /// let bare = ClientMessage::parse(r#"{"event":"register","data":"tab-1"}"#).unwrap();
    /// let object =
    ///     ClientMessage::parse(r#"{"event":"register","data":{"clientId":"tab-1"}}"#).unwrap();
    /// assert_eq!(bare, object);
    /// ```
    pub fn parse(text: &str) -> Result<Self, ClientMessageError> {
        // Serde would also accept a positional array for the frame struct.
        let object: Map<String, Value> = serde_json::from_str(text)?;
        let frame: ClientFrame = serde_json::from_value(Value::Object(object))?;
        if frame.event != REGISTER_EVENT {
            return Ok(Self::Other(frame.event));
        }
        let raw = match serde_json::from_value::<RegisterPayload>(frame.data) {
            Ok(RegisterPayload::Bare(id)) => id,
            Ok(RegisterPayload::Object { client_id }) => client_id.unwrap_or_default(),
            Err(_) => String::new(),
        };
        Ok(Self::Register(ClientId::new(raw)?))
    }
}

/// Payload of the `registered` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAck {
    pub client_id: String,
    /// `false` when no `initialize` preceded the registration.
    pub bound: bool,
}

impl RegisteredAck {
    pub fn into_event(self) -> OutboundEvent {
        OutboundEvent::new(
            EventName::new(REGISTERED_EVENT),
            json!({ "clientId": self.client_id, "bound": self.bound }),
        )
    }
}

/// `error` event sent for recoverable client mistakes.
pub fn error_event(message: impl Into<String>) -> OutboundEvent {
    OutboundEvent::new(
        EventName::new(ERROR_EVENT),
        json!({ "message": message.into() }),
    )
}
