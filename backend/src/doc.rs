//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP endpoint of the relay and the schemas
//! they exchange. The document backs Swagger UI in debug builds and is
//! printed by the `openapi-dump` binary.

use crate::domain::ErrorCode;
use crate::inbound::http::clients::{InitializeRequest, InitializeResponse};
use crate::inbound::http::emit::{EmitRequest, SuccessResponse};
use crate::inbound::http::error::ErrorResponse;
use crate::inbound::http::health::{
    DatabaseMode, HealthReport, PollerReport, RealtimeReport, ServicesReport,
};
use utoipa::OpenApi;

/// OpenAPI document for the relay's REST surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "VillageLink realtime relay",
        description = "Change ingestion, client handshake, and health endpoints. \
                       Realtime events are delivered over the `/ws` WebSocket."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::emit::emit,
        crate::inbound::http::clients::initialize,
        crate::inbound::http::health::health,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        EmitRequest,
        SuccessResponse,
        InitializeRequest,
        InitializeResponse,
        ErrorResponse,
        ErrorCode,
        HealthReport,
        ServicesReport,
        RealtimeReport,
        PollerReport,
        DatabaseMode,
    )),
    tags(
        (name = "relay", description = "Change ingestion and client handshake"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    #[rstest]
    #[case("/emit")]
    #[case("/initialize")]
    #[case("/health")]
    #[case("/health/ready")]
    #[case("/health/live")]
    fn registers_path(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key(path), "missing path {path}");
    }

    #[test]
    fn error_schema_exposes_error_field() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        let schema = schemas.get("ErrorResponse").expect("ErrorResponse schema");
        match schema {
            RefOr::T(Schema::Object(object)) => {
                assert!(object.properties.contains_key("error"));
                assert!(object.properties.contains_key("code"));
            }
            _ => panic!("expected object schema"),
        }
    }
}
