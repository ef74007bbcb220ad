use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{ActionProcessor, ProcessError};
use crate::models::{ActionType, OutboxAction};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Posts an action's payload to the remote API.
///
/// The action id travels as the `Idempotency-Key` header so the server can
/// drop re-deliveries of an effect it already applied.
pub struct RemoteApiProcessor {
    client: reqwest::Client,
    base_url: String,
    action_type: ActionType,
}

impl RemoteApiProcessor {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            action_type,
        }
    }

    /// One processor per action type, sharing a client.
    pub fn for_all_types(
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Vec<RemoteApiProcessor>, String> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(ActionType::ALL
            .into_iter()
            .map(|t| RemoteApiProcessor::new(client.clone(), base_url, t))
            .collect())
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url, route(self.action_type))
    }
}

pub fn route(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::SendHug => "v1/hugs",
        ActionType::UpdateProfile => "v1/profile",
        ActionType::ClaimDevice => "v1/devices/claim",
        ActionType::UnclaimDevice => "v1/devices/unclaim",
        ActionType::UpdateDeviceSettings => "v1/devices/settings",
    }
}

/// Map a response status to an outcome. 2xx is success.
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), ProcessError> {
    if status.is_success() {
        return Ok(());
    }

    let code = status.as_u16();
    let message = if body.is_empty() {
        format!("Remote API returned {code}")
    } else {
        format!("Remote API returned {code}: {body}")
    };

    match code {
        408 | 425 | 429 => Err(ProcessError::transient(message)),
        500..=599 => Err(ProcessError::transient(message)),
        400..=499 => Err(ProcessError::permanent(message)),
        _ => Err(ProcessError::unknown(message)),
    }
}

fn classify_transport(err: reqwest::Error) -> ProcessError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ProcessError::transient(format!("Remote API request failed: {err}"))
    } else if err.is_builder() {
        ProcessError::permanent(format!("Invalid remote API request: {err}"))
    } else {
        ProcessError::unknown(format!("Remote API request failed: {err}"))
    }
}

#[async_trait]
impl ActionProcessor for RemoteApiProcessor {
    fn action_type(&self) -> ActionType {
        self.action_type
    }

    async fn process(&self, action: &OutboxAction) -> Result<(), ProcessError> {
        let resp = self
            .client
            .post(self.url())
            .header(IDEMPOTENCY_HEADER, action.id.to_string())
            .json(&action.payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"))
            .chars()
            .take(1024)
            .collect::<String>();

        classify_status(status, &body)
    }
}
