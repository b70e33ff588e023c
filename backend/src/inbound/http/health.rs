//! Health endpoints: a status report plus liveness and readiness checks for
//! orchestrators and load balancers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use actix_web::{HttpResponse, get, http::header, web};
use chrono::SecondsFormat;
use mockable::{Clock, DefaultClock};
use serde::{Deserialize, Serialize};

use crate::domain::BroadcastHub;

/// How the relay reads table data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseMode {
    /// A PostgreSQL pool backs the change source.
    Connected,
    /// No database configured; every read is empty.
    Fixture,
}

/// Static facts about the running relay reported by `GET /health`.
#[derive(Clone)]
pub struct ServiceInventory {
    pub database: DatabaseMode,
    pub poll_interval: Duration,
    pub hub: Arc<BroadcastHub>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthReport {
    pub success: bool,
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "2026-03-01T09:00:00.000Z")]
    pub timestamp: String,
    pub version: String,
    pub services: ServicesReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ServicesReport {
    pub database: DatabaseMode,
    pub realtime: RealtimeReport,
    pub poller: PollerReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RealtimeReport {
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollerReport {
    pub interval_ms: u64,
}

/// Shared health state.
///
/// Starts live but not ready. The composition root marks it ready once the
/// listener is bound and unhealthy when shutdown begins.
pub struct HealthState {
    ready: AtomicBool,
    live: AtomicBool,
    inventory: ServiceInventory,
    clock: Arc<dyn Clock>,
}

impl HealthState {
    pub fn new(inventory: ServiceInventory) -> Self {
        Self {
            ready: AtomicBool::new(false),
            live: AtomicBool::new(true),
            inventory,
            clock: Arc::new(DefaultClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Flag the service as unhealthy so liveness checks fail fast during shutdown.
    pub fn mark_unhealthy(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Current report; reading it has no side effects.
    pub fn report(&self) -> HealthReport {
        let status = match (self.is_alive(), self.is_ready()) {
            (false, _) => "draining",
            (true, false) => "starting",
            (true, true) => "ok",
        };
        HealthReport {
            success: status == "ok",
            status: status.to_owned(),
            timestamp: self
                .clock
                .utc()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            services: ServicesReport {
                database: self.inventory.database,
                realtime: RealtimeReport {
                    connections: self.inventory.hub.connection_count(),
                },
                poller: PollerReport {
                    interval_ms: u64::try_from(self.inventory.poll_interval.as_millis())
                        .unwrap_or(u64::MAX),
                },
            },
        }
    }

    fn check_response(ok: bool) -> HttpResponse {
        let mut response = if ok {
            HttpResponse::Ok()
        } else {
            HttpResponse::ServiceUnavailable()
        };

        response
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .finish()
    }
}

/// Relay status with per-service details.
#[utoipa::path(
    get,
    path = "/health",
    tags = ["health"],
    security([]),
    responses(
        (status = 200, description = "Relay is serving", body = HealthReport),
        (status = 503, description = "Relay is starting or draining", body = HealthReport)
    )
)]
#[get("/health")]
pub async fn health(state: web::Data<HealthState>) -> HttpResponse {
    let report = state.report();
    let mut response = if report.success {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(report)
}

/// Readiness check. Return 200 once the listener is bound; 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tags = ["health"],
    security([]),
    responses(
        (status = 200, description = "Server is ready to handle traffic"),
        (status = 503, description = "Server is not ready")
    )
)]
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    HealthState::check_response(state.is_ready())
}

/// Liveness check. Return 200 while the process is marked alive and 503 once draining.
#[utoipa::path(
    get,
    path = "/health/live",
    tags = ["health"],
    security([]),
    responses(
        (status = 200, description = "Server is alive"),
        (status = 503, description = "Server is shutting down")
    )
)]
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    HealthState::check_response(state.is_alive())
}
