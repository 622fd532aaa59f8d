//! Errors surfaced to clients by the failover loop.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Terminal outcome of an inbound request that produced no upstream response.
#[derive(Debug, Error)]
pub enum FailoverError {
    /// Every target was tainted when the request arrived.
    #[error("no healthy target available")]
    NoHealthyTarget,

    /// Retry and reroute budgets ran out without a response.
    #[error("failover exhausted, last target '{target}' failed: {reason}")]
    FailoverExhausted { target: String, reason: String },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

impl FailoverError {
    pub fn status(&self) -> StatusCode {
        match self {
            FailoverError::NoHealthyTarget => StatusCode::SERVICE_UNAVAILABLE,
            FailoverError::FailoverExhausted { .. } => StatusCode::BAD_GATEWAY,
            FailoverError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            FailoverError::BodyRead(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FailoverError::NoHealthyTarget => "no_healthy_target",
            FailoverError::FailoverExhausted { .. } => "failover_exhausted",
            FailoverError::BodyTooLarge { .. } => "body_too_large",
            FailoverError::BodyRead(_) => "body_read_failed",
        }
    }

    /// Last target involved, if the error came from an attempt.
    pub fn target(&self) -> Option<&str> {
        match self {
            FailoverError::FailoverExhausted { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl IntoResponse for FailoverError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}
