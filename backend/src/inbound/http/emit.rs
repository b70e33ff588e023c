//! Change ingestion endpoint.
//!
//! ```text
//! POST /emit {"table":"comreqs","action":"new","data":{"category":"Complaint"}}
//! ```

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::ports::NotifyError;
use crate::domain::{ChangeEvent, ChangeEventError, Error};
use crate::inbound::http::ApiResult;
use crate::inbound::http::error::ErrorResponse;
use crate::inbound::http::state::HttpState;

/// Body of `POST /emit`. Every field is required; they are optional here so
/// a missing field is reported in the relay's own error envelope.
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct EmitRequest {
    #[schema(example = "comreqs")]
    pub table: Option<String>,
    #[schema(example = "new")]
    pub action: Option<String>,
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

/// Acknowledgement body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: Self = Self { success: true };
}

/// Report a committed change so connected clients are told about it.
#[utoipa::path(
    post,
    path = "/emit",
    request_body = EmitRequest,
    responses(
        (status = 200, description = "Change published", body = SuccessResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 503, description = "Relay unreachable", body = ErrorResponse)
    ),
    tags = ["relay"],
    operation_id = "emitChange",
    security([])
)]
#[post("/emit")]
pub async fn emit(
    state: web::Data<HttpState>,
    payload: web::Json<EmitRequest>,
) -> ApiResult<web::Json<SuccessResponse>> {
    let EmitRequest {
        table,
        action,
        data,
    } = payload.into_inner();
    let change = ChangeEvent::from_parts(table.as_deref(), action.as_deref(), data)
        .map_err(map_change_error)?;
    state
        .notifier
        .notify(change)
        .await
        .map_err(map_notify_error)?;
    Ok(web::Json(SuccessResponse::OK))
}

fn map_change_error(err: ChangeEventError) -> Error {
    match &err {
        ChangeEventError::Missing { fields } => {
            Error::invalid_request(err.to_string()).with_details(json!({ "missing": fields }))
        }
        ChangeEventError::DataNotObject => Error::invalid_request(err.to_string()),
    }
}

fn map_notify_error(err: NotifyError) -> Error {
    match err {
        NotifyError::Rejected { message } => Error::invalid_request(message),
        NotifyError::Transport { message } => {
            Error::service_unavailable(format!("relay unavailable: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockChangeNotifier;
    use crate::domain::{ClientRegistry, ErrorCode};
    use crate::inbound::http::error::json_config;
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use mockable::DefaultClock;
    use rstest::rstest;
    use std::sync::Arc;

    fn state(notifier: MockChangeNotifier) -> web::Data<HttpState> {
        web::Data::new(HttpState::new(
            Arc::new(notifier),
            Arc::new(ClientRegistry::new(Arc::new(DefaultClock))),
        ))
    }

    async fn post_emit(notifier: MockChangeNotifier, body: Value) -> (StatusCode, Value) {
        let app = actix_test::init_service(
            App::new()
                .app_data(state(notifier))
                .app_data(json_config())
                .service(emit),
        )
        .await;
        let req = actix_test::TestRequest::post()
            .uri("/emit")
            .set_json(body)
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        let status = res.status();
        (status, actix_test::read_body_json(res).await)
    }

    #[actix_web::test]
    async fn valid_change_is_forwarded() {
        let mut notifier = MockChangeNotifier::new();
        notifier
            .expect_notify()
            .withf(|change| {
                change.table() == "announcements" && change.action().as_str() == "new"
            })
            .times(1)
            .returning(|_| Ok(()));

        let (status, body) = post_emit(
            notifier,
            json!({ "table": "announcements", "action": "new", "data": { "id": 7 } }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }

    #[actix_web::test]
    async fn camel_case_table_is_forwarded_verbatim() {
        let mut notifier = MockChangeNotifier::new();
        notifier
            .expect_notify()
            .withf(|change| change.primary_event().as_str() == "new_visitorLogs")
            .times(1)
            .returning(|_| Ok(()));

        let (status, _) = post_emit(
            notifier,
            json!({ "table": "visitorLogs", "action": "new", "data": { "id": 9 } }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[rstest]
    #[case(json!({ "action": "new", "data": {} }), "table, action and data are required")]
    #[case(json!({ "table": "faqs", "action": " ", "data": {} }), "table, action and data are required")]
    #[case(json!({ "table": "faqs", "action": "new" }), "table, action and data are required")]
    #[case(json!({ "table": "faqs", "action": "new", "data": [1] }), "data must be a JSON object")]
    #[actix_rt::test]
    async fn malformed_requests_are_rejected(#[case] body: Value, #[case] message: &str) {
        let mut notifier = MockChangeNotifier::new();
        notifier.expect_notify().never();

        let (status, body) = post_emit(notifier, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().expect("error message");
        assert!(error.starts_with(message), "unexpected error: {error}");
        assert_eq!(body["code"], json!(ErrorCode::InvalidRequest));
    }

    #[actix_web::test]
    async fn missing_fields_are_listed() {
        let mut notifier = MockChangeNotifier::new();
        notifier.expect_notify().never();

        let (_, body) = post_emit(notifier, json!({ "table": "faqs" })).await;

        assert_eq!(body["details"], json!({ "missing": ["action", "data"] }));
    }

    #[actix_web::test]
    async fn non_json_body_uses_the_error_envelope() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state(MockChangeNotifier::new()))
                .app_data(json_config())
                .service(emit),
        )
        .await;
        let req = actix_test::TestRequest::post()
            .uri("/emit")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();

        let res = actix_test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = actix_test::read_body_json(res).await;
        assert!(body.error.starts_with("invalid JSON body"));
    }

    #[actix_web::test]
    async fn transport_failure_maps_to_service_unavailable() {
        let mut notifier = MockChangeNotifier::new();
        notifier
            .expect_notify()
            .returning(|_| Err(NotifyError::transport("connection refused")));

        let (status, _) = post_emit(
            notifier,
            json!({ "table": "faqs", "action": "new", "data": { "id": 1 } }),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
