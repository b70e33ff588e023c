//! Client handshake endpoint.
//!
//! ```text
//! POST /initialize {"clientId":"tab-42"}
//! ```
//!
//! The second half of the handshake, `register`, arrives over the WebSocket.

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ClientId, ClientIdError, Error};
use crate::inbound::http::ApiResult;
use crate::inbound::http::error::ErrorResponse;
use crate::inbound::http::state::HttpState;

/// Body of `POST /initialize`.
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    #[schema(example = "tab-42")]
    pub client_id: Option<String>,
}

/// Acknowledgement echoing the registered identifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub success: bool,
    pub client_id: String,
}

/// Create (or replace) the registry entry for a client.
#[utoipa::path(
    post,
    path = "/initialize",
    request_body = InitializeRequest,
    responses(
        (status = 200, description = "Client initialised", body = InitializeResponse),
        (status = 400, description = "Missing clientId", body = ErrorResponse)
    ),
    tags = ["relay"],
    operation_id = "initializeClient",
    security([])
)]
#[post("/initialize")]
pub async fn initialize(
    state: web::Data<HttpState>,
    payload: web::Json<InitializeRequest>,
) -> ApiResult<web::Json<InitializeResponse>> {
    let raw = payload.into_inner().client_id.unwrap_or_default();
    let client_id = ClientId::new(raw).map_err(map_client_id_error)?;
    let registration = state.registry.initialize(client_id.clone());
    debug!(client_id = %client_id, initialized_at = %registration.initialized_at, "client initialised");
    Ok(web::Json(InitializeResponse {
        success: true,
        client_id: client_id.as_str().to_owned(),
    }))
}

fn map_client_id_error(err: ClientIdError) -> Error {
    Error::invalid_request(err.to_string())
}
