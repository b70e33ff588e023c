//! Shared wiring for relay integration tests.
//!
//! `relay_context` builds a relay over an in-memory source and a clock the
//! test controls; `spawn_relay` serves it on an ephemeral port with the same
//! routes the binary mounts.
#![allow(dead_code, reason = "each test crate uses a different subset")]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpServer, web};
use chrono::{DateTime, TimeZone, Utc};
use villagelink::Trace;
use villagelink::domain::{ConnectionId, RelayContext, TableName, TrackedTables};
use villagelink::inbound::http::clients::initialize;
use villagelink::inbound::http::emit::emit;
use villagelink::inbound::http::health::{
    DatabaseMode, HealthState, ServiceInventory, health, live, ready,
};
use villagelink::inbound::http::json_config;
use villagelink::inbound::http::state::HttpState;
use villagelink::inbound::ws;
use villagelink::inbound::ws::state::WsState;
use villagelink::test_support::{InMemoryChangeSource, MutableClock, RecordingSink};

pub fn table(name: &str) -> TableName {
    TableName::new(name).expect("valid table name")
}

/// 2026-03-01T09:00:00Z, the reference instant for poll scenarios.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("valid instant")
}

pub struct Harness {
    pub relay: Arc<RelayContext>,
    pub source: Arc<InMemoryChangeSource>,
    pub clock: Arc<MutableClock>,
}

impl Harness {
    /// Relay tracking `tables`, with its clock parked at [`t0`].
    pub fn new(tables: &[&str]) -> Self {
        let source = Arc::new(InMemoryChangeSource::new());
        let clock = Arc::new(MutableClock::new(t0()));
        let relay = Arc::new(RelayContext::new(
            Arc::clone(&source) as _,
            TrackedTables::new(tables.iter().map(|name| table(name))),
            Arc::clone(&clock) as _,
        ));
        Self {
            relay,
            source,
            clock,
        }
    }

    /// Attach a recording connection to the hub.
    pub fn observe(&self) -> Arc<RecordingSink> {
        let sink = Arc::new(RecordingSink::new());
        self.relay
            .hub()
            .add(ConnectionId::generate(), Arc::clone(&sink) as _);
        sink
    }
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Serve `relay` on `127.0.0.1:0` with every public route.
pub fn spawn_relay(relay: Arc<RelayContext>) -> RunningRelay {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let health_state = web::Data::new(HealthState::new(ServiceInventory {
        database: DatabaseMode::Fixture,
        poll_interval: Duration::from_millis(3000),
        hub: Arc::clone(relay.hub()),
    }));
    let http_state = web::Data::new(HttpState::new(
        Arc::new(relay.ingest_service()),
        Arc::clone(relay.registry()),
    ));
    let ws_state = web::Data::new(WsState::new(relay));
    health_state.mark_ready();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(health_state.clone())
            .app_data(http_state.clone())
            .app_data(ws_state.clone())
            .app_data(json_config())
            .wrap(Trace)
            .service(emit)
            .service(initialize)
            .service(ws::ws_entry)
            .service(health)
            .service(ready)
            .service(live)
    })
    .workers(1)
    .disable_signals()
    .listen(listener)
    .expect("listen on test socket")
    .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    RunningRelay { addr, handle }
}

/// Poll `condition` every 5ms for up to two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
