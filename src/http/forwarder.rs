//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite an attempt's URI onto the chosen target
//! - Send it with a per-attempt deadline
//! - Classify the result for the failover loop
//!
//! # Design Decisions
//! - Only connection-level failures are retryable; any HTTP response,
//!   including a 5xx, is an answer from the upstream
//! - The response body is streamed back, never buffered
//! - Targets may be `http` or `https`; upstream hops are always HTTP/1.x
//! - Requests the client refuses to send are rejected, not blamed on the
//!   target

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderValue, Request, Response, Uri, Version};
use hyper::body::Incoming;
use std::time::Duration;
use thiserror::Error;

use crate::config::TargetConnection;
use crate::http::client::{upstream_client, UpstreamClient};
use crate::http::request::strip_hop_by_hop;
use crate::resilience::timeouts::with_deadline;

/// A forward attempt that produced no HTTP response.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid target uri: {0}")]
    InvalidUri(String),

    /// The request itself cannot be sent upstream.
    #[error("request rejected before sending: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Whether the failure says something about the target's health.
    pub fn is_target_fault(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

/// Result of one forward attempt.
#[derive(Debug)]
pub enum ForwardOutcome {
    Success(Response<Body>),
    /// The upstream answered with a server error; passed through untouched.
    ApplicationError(Response<Body>),
    TransportFailure(TransportError),
}

impl ForwardOutcome {
    fn from_response(response: Response<Body>) -> Self {
        if response.status().is_server_error() {
            ForwardOutcome::ApplicationError(response)
        } else {
            ForwardOutcome::Success(response)
        }
    }
}

/// Sends a prepared request to a target.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, target: &TargetConnection, request: Request<Body>) -> ForwardOutcome;
}

/// Forwarder backed by the pooled hyper client.
pub struct HyperForwarder {
    client: UpstreamClient,
    timeout: Duration,
}

impl HyperForwarder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: upstream_client(),
            timeout,
        }
    }
}

#[async_trait]
impl Forwarder for HyperForwarder {
    async fn forward(&self, target: &TargetConnection, mut request: Request<Body>) -> ForwardOutcome {
        if !matches!(request.version(), Version::HTTP_10 | Version::HTTP_11) {
            return ForwardOutcome::TransportFailure(TransportError::Rejected(format!(
                "unsupported upstream version {:?}",
                request.version()
            )));
        }
        let uri = match upstream_uri(&target.http.url, request.uri()) {
            Ok(uri) => uri,
            Err(e) => return ForwardOutcome::TransportFailure(e),
        };
        if let Some(host) = uri.authority().and_then(|a| HeaderValue::from_str(a.as_str()).ok()) {
            request.headers_mut().insert(header::HOST, host);
        }
        *request.uri_mut() = uri;

        match with_deadline(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => ForwardOutcome::from_response(into_client_response(response)),
            Ok(Err(e)) => ForwardOutcome::TransportFailure(TransportError::Connect(e.to_string())),
            Err(_) => ForwardOutcome::TransportFailure(TransportError::Timeout(self.timeout)),
        }
    }
}

/// Stream the upstream body back without its connection-level headers.
fn into_client_response(response: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Combine the target URL with the inbound URI.
///
/// Scheme, authority and path come from the target so that endpoints
/// carrying a key in their path keep working; the query comes from the
/// inbound request.
pub fn upstream_uri(target_url: &str, inbound: &Uri) -> Result<Uri, TransportError> {
    let base: Uri = target_url
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| TransportError::InvalidUri(e.to_string()))?;

    let scheme = base.scheme().cloned().unwrap_or(Scheme::HTTP);
    let authority: Authority = base
        .authority()
        .cloned()
        .ok_or_else(|| TransportError::InvalidUri(format!("{target_url} has no host")))?;

    let path = match base.path() {
        "" => "/",
        path => path,
    };
    let path_and_query = match inbound.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let path_and_query = PathAndQuery::try_from(path_and_query)
        .map_err(|e| TransportError::InvalidUri(e.to_string()))?;

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| TransportError::InvalidUri(e.to_string()))
}
