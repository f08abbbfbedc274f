use std::time::Duration;

use serde_json::Value;

use super::client::retry_after_secs;
use super::types::{
    DiagnosisCondition, DiagnosisRequest, ModelResponse, ReasoningBackend, TurnRequest,
};
use super::ReasoningError;
use crate::diagnosis::ranking::normalize_conditions;

/// Header identifying the caller to the gateway's inbound rate limiter.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// `ReasoningBackend` that talks to a running gateway over HTTP
/// (`/api/interactive`, `/api/diagnose`).
pub struct RemoteGateway {
    base_url: String,
    client_id: String,
    client: reqwest::blocking::Client,
}

impl RemoteGateway {
    pub fn new(base_url: &str, client_id: &str, timeout_secs: u64) -> Result<Self, ReasoningError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReasoningError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client,
        })
    }

    fn post_json<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Value, ReasoningError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header(CLIENT_ID_HEADER, &self.client_id)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ReasoningError::Connection(self.base_url.clone())
                } else {
                    ReasoningError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ReasoningError::RateLimited {
                retry_after: retry_after_secs(response.headers()),
            });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(path, status = status.as_u16(), "Gateway returned error status");
            return Err(ReasoningError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| ReasoningError::ResponseParsing(e.to_string()))
    }
}

impl ReasoningBackend for RemoteGateway {
    fn interactive_response(&self, request: &TurnRequest) -> Result<ModelResponse, ReasoningError> {
        let value = self.post_json("/api/interactive", request)?;
        serde_json::from_value(value).map_err(|e| ReasoningError::ResponseParsing(e.to_string()))
    }

    fn diagnose_symptoms(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<Vec<DiagnosisCondition>, ReasoningError> {
        let value = self.post_json("/api/diagnose", request)?;
        Ok(normalize_conditions(&value))
    }
}
