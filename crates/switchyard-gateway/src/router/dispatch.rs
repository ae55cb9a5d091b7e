//! HTTP wire contracts
//!
//! Gateway: POST enveloped `{tool, payload, metadata}` with correlation headers
//! and the bearer credential.
//! Direct: POST the raw payload with correlation headers and the fallback
//! marker, never a credential.
//! Probe: GET `<endpoint>/health`, any 2xx is healthy.
//!
//! Every call is bounded by a timeout; an expired call is dropped, which
//! aborts the in-flight request.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use switchyard_core::ToolRegistryEntry;
use tracing::debug;

use super::error::DispatchFailure;

pub const HEADER_DOCTRINE_ID: &str = "X-Doctrine-ID";
pub const HEADER_BRANCH: &str = "X-Branch";
pub const HEADER_REQUEST_ID: &str = "X-Request-ID";
pub const HEADER_FALLBACK: &str = "X-Fallback";

pub struct HttpDispatcher {
    client: reqwest::Client,
    gateway_token: Option<String>,
    source: String,
}

impl HttpDispatcher {
    pub fn new(gateway_token: Option<String>, source: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Switchyard/1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self::with_client(client, gateway_token, source)
    }

    pub fn with_client(
        client: reqwest::Client,
        gateway_token: Option<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            client,
            gateway_token,
            source: source.into(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.gateway_token.is_some()
    }

    /// Gateway envelope for a payload
    pub fn envelope(&self, entry: &ToolRegistryEntry, payload: &Value) -> Value {
        json!({
            "tool": entry.tool,
            "payload": payload,
            "metadata": {
                "doctrine_id": entry.doctrine_id,
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                "source": self.source,
            }
        })
    }

    pub async fn post_gateway(
        &self,
        entry: &ToolRegistryEntry,
        payload: &Value,
        timeout: Duration,
        request_id: &str,
    ) -> Result<Value, DispatchFailure> {
        let mut request = self
            .correlated(entry, request_id)
            .json(&self.envelope(entry, payload));

        if let Some(ref token) = self.gateway_token {
            request = request.bearer_auth(token);
        }

        self.execute(&entry.endpoint, request, timeout).await
    }

    pub async fn post_direct(
        &self,
        entry: &ToolRegistryEntry,
        payload: &Value,
        timeout: Duration,
        request_id: &str,
    ) -> Result<Value, DispatchFailure> {
        let request = self
            .correlated(entry, request_id)
            .header(HEADER_FALLBACK, "true")
            .json(payload);

        self.execute(&entry.endpoint, request, timeout).await
    }

    /// Probe `<endpoint>/health`
    pub async fn probe(&self, endpoint: &str, timeout: Duration) -> Result<(), DispatchFailure> {
        let url = health_url(endpoint);
        let request = self.client.get(&url);

        match tokio::time::timeout(timeout, request.send()).await {
            Err(_) => Err(DispatchFailure::timeout(&url, timeout)),
            Ok(Err(e)) => Err(DispatchFailure::network(&url, e.to_string())),
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(DispatchFailure::status(
                &url,
                response.status().as_u16(),
                "",
            )),
        }
    }

    fn correlated(&self, entry: &ToolRegistryEntry, request_id: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&entry.endpoint)
            .header(HEADER_DOCTRINE_ID, &entry.doctrine_id)
            .header(HEADER_BRANCH, &entry.branch)
            .header(HEADER_REQUEST_ID, request_id)
    }

    async fn execute(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<Value, DispatchFailure> {
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| DispatchFailure::network(endpoint, e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| DispatchFailure::network(endpoint, e.to_string()))?;

            if !status.is_success() {
                return Err(DispatchFailure::status(endpoint, status.as_u16(), &body));
            }

            debug!("[Router] {} responded {}", endpoint, status);
            Ok::<Value, DispatchFailure>(parse_body(body))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| DispatchFailure::timeout(endpoint, timeout))?
    }
}

fn health_url(endpoint: &str) -> String {
    format!("{}/health", endpoint.trim_end_matches('/'))
}

/// JSON bodies are returned as-is, anything else as a JSON string
fn parse_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}
