//! Reqwest-backed change notifier.
//!
//! Lets a write-side process that does not share memory with the relay
//! report changes through `POST /emit`. The adapter owns transport details
//! only: request serialisation, timeout, trace propagation, and status
//! mapping.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::ports::{ChangeNotifier, NotifyError};
use crate::domain::{ChangeEvent, TraceId};
use crate::middleware::TRACE_ID_HEADER;

const DEFAULT_USER_AGENT: &str = concat!("villagelink-notifier/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct EmitBody<'a> {
    table: &'a str,
    action: &'a str,
    data: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`ChangeNotifier`] that forwards changes to a relay over HTTP.
pub struct RelayHttpNotifier {
    client: Client,
    endpoint: Url,
}

impl RelayHttpNotifier {
    /// Build a notifier posting to `endpoint`, normally `<relay>/emit`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChangeNotifier for RelayHttpNotifier {
    async fn notify(&self, change: ChangeEvent) -> Result<(), NotifyError> {
        let body = EmitBody {
            table: change.table(),
            action: change.action().as_str(),
            data: change.data(),
        };
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(trace_id) = TraceId::current() {
            request = request.header(TRACE_ID_HEADER, trace_id.to_string());
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(status, body.as_ref()))
    }
}

fn map_transport_error(error: reqwest::Error) -> NotifyError {
    NotifyError::transport(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> NotifyError {
    let detail = serde_json::from_slice::<ErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_owned());
    let message = if detail.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {detail}", status.as_u16())
    };

    if status.is_client_error() {
        NotifyError::rejected(message)
    } else {
        NotifyError::transport(message)
    }
}
