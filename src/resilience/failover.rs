//! Request-level retry and reroute orchestration.
//!
//! # Algorithm
//! ```text
//! select healthy target (excluding none)     → none: NoHealthyTarget
//! loop:
//!     forward replayed body to target
//!     response (any status)                  → return it
//!     transport failure:
//!         target's fault                     → count against its health
//!         retries < max_retries              → retry same target
//!         reroutes < max_reroutes            → exclude target, select next
//!         otherwise / nothing left           → FailoverExhausted
//! ```
//!
//! # Design Decisions
//! - The body is captured before the first attempt and replayed verbatim
//! - Retry/reroute bookkeeping lives in a per-request `FailoverContext`;
//!   every attempt carries an immutable snapshot of it
//! - Dropping the future (client disconnect, request timeout) cancels the
//!   in-flight attempt

use axum::body::Body;
use axum::http::Response;
use std::sync::Arc;

use crate::config::FailoverConfig;
use crate::health::HealthcheckManager;
use crate::http::body::ReplayBody;
use crate::http::context::{AttemptContext, FailoverContext};
use crate::http::forwarder::{ForwardOutcome, Forwarder, TransportError};
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::resilience::error::FailoverError;

/// Retry and reroute budgets for one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    pub max_retries: u32,
    /// Target switches allowed per request, counted exactly: checked before
    /// switching, so `2` means at most three distinct targets are tried.
    pub max_reroutes: u32,
}

impl From<&FailoverConfig> for FailoverPolicy {
    fn from(config: &FailoverConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_reroutes: config.max_reroutes,
        }
    }
}

/// Drives forward attempts for inbound requests.
pub struct FailoverOrchestrator {
    manager: Arc<HealthcheckManager>,
    forwarder: Arc<dyn Forwarder>,
    policy: FailoverPolicy,
}

impl FailoverOrchestrator {
    pub fn new(
        manager: Arc<HealthcheckManager>,
        forwarder: Arc<dyn Forwarder>,
        policy: FailoverPolicy,
    ) -> Self {
        Self {
            manager,
            forwarder,
            policy,
        }
    }

    pub fn policy(&self) -> FailoverPolicy {
        self.policy
    }

    /// Forward `inbound` until an upstream answers or the budgets run out.
    ///
    /// The returned response carries the final [`AttemptContext`] in its
    /// extensions.
    pub async fn execute(
        &self,
        inbound: InboundRequest,
        body: ReplayBody,
    ) -> Result<Response<Body>, FailoverError> {
        let mut ctx = FailoverContext::new(body);
        let mut index = self
            .manager
            .next_healthy_target_index_excluding(ctx.excluded())
            .ok_or(FailoverError::NoHealthyTarget)?;

        loop {
            let target = self
                .manager
                .target(index)
                .ok_or(FailoverError::NoHealthyTarget)?;
            ctx.begin_attempt(target.name());
            let attempt = ctx.attempt();

            let prepared = ctx.body().for_target(target.connection().http.compression);
            let request = inbound.build_attempt(prepared, attempt.clone());

            tracing::debug!(
                target_name = %target.name(),
                index,
                retries = attempt.retries,
                reroutes = attempt.reroutes,
                client_version = ?inbound.version,
                "Forwarding attempt"
            );

            let error = match self.forwarder.forward(target.connection(), request).await {
                ForwardOutcome::Success(response) => {
                    self.manager.record_request_outcome(index, true);
                    return Ok(with_attempt(response, attempt));
                }
                ForwardOutcome::ApplicationError(response) => {
                    tracing::debug!(
                        target_name = %target.name(),
                        status = %response.status(),
                        "Upstream returned server error, passing through"
                    );
                    self.manager.record_request_outcome(index, true);
                    return Ok(with_attempt(response, attempt));
                }
                ForwardOutcome::TransportFailure(error) => error,
            };

            if error.is_target_fault() {
                self.manager.record_request_outcome(index, false);
            }
            tracing::warn!(
                target_name = %target.name(),
                retries = ctx.retries(),
                reroutes = ctx.reroutes(),
                error = %error,
                "Forward attempt failed"
            );

            if ctx.retries() < self.policy.max_retries {
                ctx.record_retry();
                metrics::record_retry(target.name());
                continue;
            }

            if ctx.reroutes() >= self.policy.max_reroutes {
                return Err(exhausted(target.name(), &error));
            }

            ctx.record_reroute(index);
            metrics::record_reroute(target.name());
            index = match self.manager.next_healthy_target_index_excluding(ctx.excluded()) {
                Some(next) => next,
                None => return Err(exhausted(target.name(), &error)),
            };
            tracing::info!(
                from = %target.name(),
                reroutes = ctx.reroutes(),
                "Rerouting request"
            );
        }
    }
}

fn with_attempt(mut response: Response<Body>, attempt: AttemptContext) -> Response<Body> {
    response.extensions_mut().insert(attempt);
    response
}

fn exhausted(target: &str, error: &TransportError) -> FailoverError {
    FailoverError::FailoverExhausted {
        target: target.to_string(),
        reason: error.to_string(),
    }
}
