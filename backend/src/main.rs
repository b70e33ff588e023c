//! Relay entry-point: loads settings, builds the relay context, serves HTTP and
//! WebSocket traffic, and runs the poll loop until shutdown.

mod server;

use std::sync::Arc;

use actix_web::web;
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use server::{ServerConfig, create_server};
use villagelink::domain::ports::{ChangeSource, FixtureChangeSource};
use villagelink::domain::{RelayContext, TrackedTables};
use villagelink::inbound::http::health::{DatabaseMode, HealthState};
use villagelink::outbound::persistence::{DbPool, DieselChangeSource, PoolConfig};
use villagelink::settings::RelaySettings;

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = RelaySettings::load()
        .map_err(|e| std::io::Error::other(format!("failed to load configuration: {e}")))?;
    let bind_addr = settings.bind_addr().map_err(std::io::Error::other)?;
    let tables = settings.tracked_tables().map_err(std::io::Error::other)?;
    let poll_interval = settings.poll_interval();

    let (source, database) = build_change_source(&settings, &tables).await?;
    let relay = Arc::new(RelayContext::new(source, tables, Arc::new(DefaultClock)));

    let config = ServerConfig::new(bind_addr, Arc::clone(&relay))
        .with_database(database)
        .with_poll_interval(poll_interval);
    let health_state = web::Data::new(HealthState::new(config.inventory()));
    let server = create_server(health_state.clone(), config)?;
    let handle = server.handle();
    info!(%bind_addr, tables = relay.tables().len(), "relay listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let scheduler = relay.poll_scheduler(poll_interval);
    let poller = tokio::spawn(async move {
        scheduler
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await;
    });

    actix_web::rt::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        health_state.mark_unhealthy();
        let _ = stop_tx.send(());
        let closed = relay.hub().close_all();
        info!(connections = closed, "closed realtime connections");
        handle.stop(true).await;
    });

    server.await?;
    if let Err(e) = poller.await {
        warn!(error = %e, "poll loop ended abnormally");
    }
    Ok(())
}

async fn build_change_source(
    settings: &RelaySettings,
    tables: &TrackedTables,
) -> std::io::Result<(Arc<dyn ChangeSource>, DatabaseMode)> {
    let Some(url) = settings.database_url() else {
        warn!("no database configured; serving fixture data");
        return Ok((Arc::new(FixtureChangeSource), DatabaseMode::Fixture));
    };

    let pool = DbPool::new(PoolConfig::new(url).with_max_size(settings.pool_max_size()))
        .await
        .map_err(|e| std::io::Error::other(format!("database pool: {e}")))?;
    let source = DieselChangeSource::new(pool, tables.clone())
        .with_timeout(settings.store_timeout());
    Ok((Arc::new(source), DatabaseMode::Connected))
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable; waiting for Ctrl-C");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
