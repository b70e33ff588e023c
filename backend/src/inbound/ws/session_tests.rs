//! WebSocket session handler tests.

use super::*;
use crate::domain::{ClientId, EventName, TableName, TrackedTables};
use crate::inbound::ws;
use crate::inbound::ws::state::WsState;
use crate::test_support::InMemoryChangeSource;
use actix_web::{App, HttpServer, dev::ServerHandle};
use awc::{BoxedSocket, ws::Codec, ws::Frame};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

type Socket = actix_codec::Framed<BoxedSocket, Codec>;

struct Client {
    socket: Socket,
    relay: Arc<RelayContext>,
    _server: ServerHandle,
}

fn relay() -> Arc<RelayContext> {
    let source = InMemoryChangeSource::new();
    let faqs = TableName::new("faqs").expect("table");
    source.insert(&faqs, Utc::now(), json!({ "id": 1, "question": "Opening hours?" }));
    let tables = TrackedTables::new([faqs, TableName::new("users").expect("table")]);
    Arc::new(RelayContext::new(
        Arc::new(source),
        tables,
        Arc::new(DefaultClock),
    ))
}

#[fixture]
async fn client() -> Client {
    let relay = relay();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let ws_state = WsState::new(Arc::clone(&relay));
    let server = HttpServer::new(move || {
        App::new()
            .app_data(actix_web::web::Data::new(ws_state.clone()))
            .service(ws::ws_entry)
    })
    .listen(listener)
    .expect("bind test server")
    .disable_signals()
    .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let (_resp, socket) = awc::Client::default()
        .ws(format!("http://{addr}/ws"))
        .connect()
        .await
        .expect("websocket connect");

    wait_for(|| relay.hub().connection_count() == 1).await;
    Client {
        socket,
        relay,
        _server: handle,
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(awc::ws::Message::Text(value.to_string().into()))
        .await
        .expect("send text");
}

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = socket.next().await.expect("response frame").expect("frame");
        match frame {
            Frame::Text(bytes) => return serde_json::from_slice(&bytes).expect("json frame"),
            Frame::Ping(_) | Frame::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

async fn next_close(socket: &mut Socket) -> CloseReason {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let frame = socket.next().await.expect("response frame").expect("frame");
            match frame {
                Frame::Ping(_) | Frame::Pong(_) | Frame::Text(_) => continue,
                Frame::Close(reason) => return reason.expect("close reason"),
                other => panic!("unexpected frame before close: {other:?}"),
            }
        }
    })
    .await
    .expect("close frame missing within timeout")
}

#[rstest]
#[actix_rt::test]
async fn register_binds_and_sends_initial_dataset(#[future] client: Client) {
    let Client {
        mut socket, relay, ..
    } = client.await;
    let client_id = ClientId::new("tab-1").expect("client id");
    relay.registry().initialize(client_id.clone());

    send_json(&mut socket, json!({ "event": "register", "data": { "clientId": "tab-1" } })).await;

    let ack = next_event(&mut socket).await;
    assert_eq!(
        ack,
        json!({ "event": "registered", "data": { "clientId": "tab-1", "bound": true } })
    );
    let dataset = next_event(&mut socket).await;
    assert_eq!(dataset["event"], "tableData");
    assert_eq!(dataset["data"]["faqs"][0]["question"], "Opening hours?");
    assert_eq!(dataset["data"]["users"], json!([]));
    assert!(relay.registry().connection_for(&client_id).is_some());
}

#[rstest]
#[actix_rt::test]
async fn register_without_initialize_is_acknowledged_unbound(#[future] client: Client) {
    let Client {
        mut socket, relay, ..
    } = client.await;

    send_json(&mut socket, json!({ "event": "register", "data": "ghost" })).await;

    let ack = next_event(&mut socket).await;
    assert_eq!(ack["data"]["bound"], json!(false));
    assert!(relay.registry().is_empty());
}

#[rstest]
#[actix_rt::test]
async fn invalid_register_gets_an_error_event(#[future] client: Client) {
    let Client { mut socket, .. } = client.await;

    send_json(&mut socket, json!({ "event": "register", "data": {} })).await;

    let error = next_event(&mut socket).await;
    assert_eq!(error["event"], "error");
    assert_eq!(error["data"]["message"], "clientId is required");
}

#[rstest]
#[actix_rt::test]
async fn hub_broadcasts_reach_the_socket_in_order(#[future] client: Client) {
    let Client {
        mut socket, relay, ..
    } = client.await;

    relay
        .hub()
        .publish(&EventName::new("new_comreqs"), json!({ "id": 9 }));
    relay.hub().publish(&EventName::new("new_complaint"), json!({ "id": 9 }));

    assert_eq!(next_event(&mut socket).await["event"], "new_comreqs");
    assert_eq!(next_event(&mut socket).await["event"], "new_complaint");
}

#[rstest]
#[actix_rt::test]
async fn disconnect_removes_the_bound_entry(#[future] client: Client) {
    let Client {
        mut socket, relay, ..
    } = client.await;
    relay
        .registry()
        .initialize(ClientId::new("tab-1").expect("client id"));
    relay
        .registry()
        .initialize(ClientId::new("tab-2").expect("client id"));
    send_json(&mut socket, json!({ "event": "register", "data": "tab-1" })).await;
    next_event(&mut socket).await;

    socket
        .send(awc::ws::Message::Close(None))
        .await
        .expect("send close");

    wait_for(|| relay.hub().connection_count() == 0 && relay.registry().len() == 1).await;
    assert!(
        relay
            .registry()
            .get(&ClientId::new("tab-2").expect("client id"))
            .is_some()
    );
}

#[rstest]
#[actix_rt::test]
async fn closes_on_malformed_json(#[future] client: Client) {
    let Client { mut socket, .. } = client.await;
    socket
        .send(awc::ws::Message::Text("not-json".into()))
        .await
        .expect("send text");

    assert_eq!(next_close(&mut socket).await.code, CloseCode::Policy);
}

#[rstest]
#[actix_rt::test]
async fn closes_when_the_relay_drops_the_connection(#[future] client: Client) {
    let Client {
        mut socket, relay, ..
    } = client.await;

    assert_eq!(relay.hub().close_all(), 1);

    let reason = next_close(&mut socket).await;
    assert_eq!(reason.code, CloseCode::Away);
    assert_eq!(reason.description.as_deref(), Some("relay shutting down"));
}

#[rstest]
#[actix_rt::test]
async fn closes_after_timeout_without_client_messages(#[future] client: Client) {
    let Client { mut socket, .. } = client.await;
    tokio::time::sleep(CLIENT_TIMEOUT + HEARTBEAT_INTERVAL * 3).await;

    let reason = next_close(&mut socket).await;
    assert_eq!(reason.code, CloseCode::Normal);
    assert_eq!(reason.description.as_deref(), Some("heartbeat timeout"));
}
