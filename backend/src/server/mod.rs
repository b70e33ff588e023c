//! Server construction and middleware wiring.

mod config;

pub use config::ServerConfig;

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use villagelink::Trace;
#[cfg(debug_assertions)]
use villagelink::doc::ApiDoc;
use villagelink::inbound::http::clients::initialize;
use villagelink::inbound::http::emit::emit;
use villagelink::inbound::http::health::{HealthState, health, live, ready};
use villagelink::inbound::http::json_config;
use villagelink::inbound::http::state::HttpState;
use villagelink::inbound::ws;
use villagelink::inbound::ws::state::WsState;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    ws_state: web::Data<WsState>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        ws_state,
    } = deps;

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(ws_state)
        .app_data(json_config())
        .wrap(Trace)
        .service(emit)
        .service(initialize)
        .service(ws::ws_entry)
        .service(health)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Construct an Actix HTTP server using the provided health state and configuration.
///
/// Actix's own signal handling is disabled; the caller owns shutdown so it can
/// drain the relay before stopping the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let server_health_state = health_state.clone();
    let relay = Arc::clone(config.relay());
    let http_state = web::Data::new(HttpState::new(
        Arc::new(relay.ingest_service()),
        Arc::clone(relay.registry()),
    ));
    let ws_state = web::Data::new(WsState::new(relay));

    let server = HttpServer::new(move || {
        build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
            ws_state: ws_state.clone(),
        })
    })
    .disable_signals()
    .bind(config.bind_addr())?
    .run();

    health_state.mark_ready();
    Ok(server)
}
