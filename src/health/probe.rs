//! Active health probing.
//!
//! # Responsibilities
//! - Issue one health request against a target
//! - Classify the result as healthy / unhealthy
//!
//! # Design Decisions
//! - Probes know nothing about thresholds; the manager records outcomes
//! - The manager bounds every probe with the configured timeout
//! - Default probe is a JSON-RPC call, since targets are RPC endpoints

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::TargetConnection;
use crate::http::client::{upstream_client, UpstreamClient};

/// Largest probe response body we are willing to read.
const MAX_PROBE_BODY: usize = 64 * 1024;

/// Why a probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build probe request: {0}")]
    Request(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("non-success status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Body(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("probe timed out")]
    Timeout,
}

/// A health check against a single target.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, connection: &TargetConnection) -> Result<(), ProbeError>;
}

/// Probe that calls a cheap JSON-RPC method on the target URL.
pub struct JsonRpcProbe {
    client: UpstreamClient,
    method: String,
}

impl JsonRpcProbe {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            client: upstream_client(),
            method: method.into(),
        }
    }

    fn payload(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": self.method,
            "params": [],
            "id": 1,
        })
    }
}

#[async_trait]
impl HealthProbe for JsonRpcProbe {
    async fn check(&self, connection: &TargetConnection) -> Result<(), ProbeError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(&connection.http.url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "failover-proxy-health-check")
            .body(Body::from(self.payload().to_string()))
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_PROBE_BODY)
            .await
            .map_err(|e| ProbeError::Body(e.to_string()))?;
        check_rpc_body(&bytes)
    }
}

/// A JSON-RPC reply is healthy if it carries a `result` and no `error`.
fn check_rpc_body(bytes: &[u8]) -> Result<(), ProbeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ProbeError::Body(e.to_string()))?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return Err(ProbeError::Rpc(error.to_string()));
    }
    if value.get("result").is_none() {
        return Err(ProbeError::Body("missing result".to_string()));
    }
    Ok(())
}
