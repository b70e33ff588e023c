//! Per-connection WebSocket handler.
//!
//! Each session owns one hub sink. Broadcasts arrive on the sink's channel
//! and are written to the socket in order; client frames are decoded and the
//! `register` handshake is answered. The public contract pings every 5s and
//! closes a client idle for 10s. Tests shorten both intervals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time;
use tracing::{debug, info, warn};

use crate::domain::{ClientId, ConnectionId, OutboundEvent, RelayContext};
use crate::inbound::ws::messages::{
    ClientMessage, ClientMessageError, RegisteredAck, error_event,
};
use crate::inbound::ws::sink::ChannelSink;

/// Time between heartbeats to the client (5s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max idle time before disconnecting the client (10s in production, shorter in tests).
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

pub(super) async fn handle_ws_session(
    relay: Arc<RelayContext>,
    session: Session,
    stream: MessageStream,
) {
    let connection = ConnectionId::generate();
    let (sink, outbound) = ChannelSink::pair();
    relay.hub().add(connection, Arc::new(sink));
    info!(%connection, "realtime connection opened");

    WsSession {
        relay: Arc::clone(&relay),
        connection,
    }
    .run(session, stream, outbound)
    .await;

    relay.hub().remove(connection);
    match relay.registry().unregister(connection) {
        Some(client_id) => {
            info!(%connection, client_id = %client_id, "realtime connection closed");
        }
        None => info!(%connection, "realtime connection closed"),
    }
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    RelayShutdown,
    Protocol(ProtocolError),
    InvalidPayload,
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

struct WsSession {
    relay: Arc<RelayContext>,
    connection: ConnectionId,
}

impl WsSession {
    async fn run(
        &self,
        mut session: Session,
        mut stream: MessageStream,
        mut outbound: UnboundedReceiver<Arc<OutboundEvent>>,
    ) {
        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

        loop {
            let result = tokio::select! {
                event = outbound.recv() => {
                    self.handle_outbound(&mut session, event).await
                }
                _ = heartbeat.tick() => {
                    self.handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message)
                        .await
                }
            };

            if let Err(error) = result {
                self.log_shutdown_reason(&error);
                let close_action = self.close_action_for(&error);
                self.close_session_if_needed(session, close_action).await;
                return;
            }
        }
    }

    async fn handle_outbound(
        &self,
        session: &mut Session,
        event: Option<Arc<OutboundEvent>>,
    ) -> Result<(), SessionError> {
        // The hub dropped this connection's sink: the relay is shutting down.
        let Some(event) = event else {
            return Err(SessionError::RelayShutdown);
        };
        self.send_event(session, &event)
            .await
            .map_err(SessionError::Network)
    }

    async fn handle_heartbeat_tick(
        &self,
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), SessionError> {
        if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
            return Err(SessionError::HeartbeatTimeout);
        }

        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn handle_stream_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };

        match message {
            Ok(message) => self.handle_message(session, last_heartbeat, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session
                    .pong(&payload)
                    .await
                    .map_err(SessionError::Network)?;
                Ok(())
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text_message(session, text.as_ref()).await
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    async fn handle_text_message(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<(), SessionError> {
        match ClientMessage::parse(text) {
            Ok(ClientMessage::Register(client_id)) => self
                .handle_register(session, client_id)
                .await
                .map_err(SessionError::Network),
            Ok(ClientMessage::Other(event)) => {
                debug!(connection = %self.connection, %event, "ignoring unhandled client event");
                Ok(())
            }
            Err(ClientMessageError::InvalidRegister(error)) => self
                .send_event(session, &error_event(error.to_string()))
                .await
                .map_err(SessionError::Network),
            Err(error @ ClientMessageError::Malformed(_)) => {
                warn!(
                    connection = %self.connection,
                    %error,
                    "rejected malformed WebSocket payload"
                );
                Err(SessionError::InvalidPayload)
            }
        }
    }

    async fn handle_register(
        &self,
        session: &mut Session,
        client_id: ClientId,
    ) -> Result<(), Closed> {
        let bound = self.relay.registry().register(&client_id, self.connection);
        if bound {
            info!(connection = %self.connection, client_id = %client_id, "client registered");
        } else {
            debug!(
                connection = %self.connection,
                client_id = %client_id,
                "register for uninitialised client ignored"
            );
        }

        let ack = RegisteredAck {
            client_id: client_id.as_str().to_owned(),
            bound,
        };
        self.send_event(session, &ack.into_event()).await?;

        let dataset = self.relay.initial_dataset().await;
        self.send_event(session, &OutboundEvent::table_data(dataset))
            .await
    }

    async fn send_event(&self, session: &mut Session, event: &OutboundEvent) -> Result<(), Closed> {
        match serde_json::to_string(event) {
            Ok(body) => session.text(body).await,
            Err(error) => {
                warn!(event = %event.event, %error, "failed to serialise WebSocket payload");
                Ok(())
            }
        }
    }

    fn log_shutdown_reason(&self, error: &SessionError) {
        match error {
            SessionError::HeartbeatTimeout => {
                warn!(
                    connection = %self.connection,
                    "WebSocket heartbeat timeout; closing connection"
                );
            }
            SessionError::Protocol(error) => {
                warn!(connection = %self.connection, %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(
                    connection = %self.connection,
                    %error,
                    "WebSocket send failed; closing connection"
                );
            }
            SessionError::RelayShutdown => {
                debug!(connection = %self.connection, "closing connection for relay shutdown");
            }
            SessionError::InvalidPayload
            | SessionError::ClientClosed(_)
            | SessionError::StreamClosed => {}
        }
    }

    fn close_action_for(&self, error: &SessionError) -> CloseAction {
        match error {
            SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Normal,
                description: Some("heartbeat timeout".to_owned()),
            })),
            SessionError::RelayShutdown => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Away,
                description: Some("relay shutting down".to_owned()),
            })),
            SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Protocol,
                description: Some("protocol error".to_owned()),
            })),
            SessionError::InvalidPayload => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Policy,
                description: Some("invalid payload".to_owned()),
            })),
            SessionError::ClientClosed(reason) => CloseAction::Close(reason.clone()),
            SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
        }
    }

    async fn close_session_if_needed(&self, session: Session, close_action: CloseAction) {
        if let CloseAction::Close(reason) = close_action {
            if let Err(error) = session.close(reason).await {
                warn!(connection = %self.connection, %error, "failed to close WebSocket session");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
