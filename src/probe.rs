//! Backend probe: exercises the backend debug endpoint with a bearer token.

use crate::error::ProbeError;
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a probe call.
///
/// `success` reflects the HTTP status class; the body is attached either
/// way, so a 401 with a diagnostic payload is still fully reported.
#[derive(Debug, Clone)]
pub struct ApiResult {
    pub success: bool,
    pub body: Value,
}

/// Client for the backend token-debug endpoint.
pub struct BackendProbe {
    endpoint: String,
    http_client: reqwest::Client,
}

impl BackendProbe {
    /// Create a new probe for the given endpoint URL.
    pub fn new(endpoint: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// POST the token to the debug endpoint and classify the response.
    ///
    /// Transport-level and body-parse failures are [`ProbeError`]s; an
    /// application-level rejection (non-2xx with a parsable body) is a
    /// successful probe with `success == false`.
    pub async fn probe(&self, access_token: &str) -> Result<ApiResult, ProbeError> {
        if access_token.is_empty() {
            return Err(ProbeError::EmptyToken);
        }

        debug!("Probing {}", self.endpoint);

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let success = response.status().is_success();

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        Ok(ApiResult { success, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_token_rejected_before_any_request() {
        // Unresolvable endpoint: reaching the network would fail differently
        let probe = BackendProbe::new("http://unused.invalid/api/debug/token".into()).unwrap();
        let result = probe.probe("").await;
        assert!(matches!(result, Err(ProbeError::EmptyToken)));
    }
}
