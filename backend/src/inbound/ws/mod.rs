//! WebSocket inbound adapter bridging hub broadcasts to realtime clients.
//!
//! Responsibilities:
//! - upgrade `/ws` requests and spawn one session task per connection
//! - keep framing, heartbeats, and the `register` handshake at the edge

use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use std::sync::Arc;
use tracing::error;

use crate::domain::TraceId;

mod session;
mod sink;

pub mod messages;
pub mod state;

pub use sink::ChannelSink;

/// Handle WebSocket upgrade for the `/ws` endpoint.
#[get("/ws")]
pub async fn ws_entry(
    state: web::Data<state::WsState>,
    req: HttpRequest,
    body: Payload,
) -> actix_web::Result<HttpResponse> {
    let (response, session, stream) = actix_ws::handle(&req, body).map_err(|error| {
        error!(%error, "WebSocket upgrade failed");
        error
    })?;

    let relay = Arc::clone(&state.relay);
    actix_web::rt::spawn(TraceId::propagate(
        TraceId::current(),
        session::handle_ws_session(relay, session, stream),
    ));
    Ok(response)
}
