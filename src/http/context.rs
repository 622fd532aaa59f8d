//! Request-scoped failover bookkeeping.
//!
//! # Responsibilities
//! - Track retries, reroutes, current target and excluded targets per request
//! - Own the replay buffer for the request body
//! - Expose typed read accessors to the forwarder / handler layer
//!
//! # Design Decisions
//! - `FailoverContext` is a plain owned record living in the request's
//!   failover loop; it is dropped when the request completes
//! - Each attempt gets an immutable `AttemptContext` snapshot in its
//!   `http::Extensions`, typed by Rust type rather than an untyped key
//! - The final response carries the last snapshot for outer layers

use axum::http::{Extensions, HeaderMap, Request, Response};
use std::collections::HashSet;
use std::net::SocketAddr;

use crate::http::body::ReplayBody;

/// Immutable bookkeeping snapshot for one forward attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptContext {
    pub reroutes: u32,
    pub retries: u32,
    pub target_name: String,
}

/// Mutable per-request failover state.
#[derive(Debug)]
pub struct FailoverContext {
    reroutes: u32,
    retries: u32,
    target_name: String,
    excluded: HashSet<usize>,
    body: ReplayBody,
}

impl FailoverContext {
    pub fn new(body: ReplayBody) -> Self {
        Self {
            reroutes: 0,
            retries: 0,
            target_name: String::new(),
            excluded: HashSet::new(),
            body,
        }
    }

    pub fn reroutes(&self) -> u32 {
        self.reroutes
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Target indices already tried and given up on.
    pub fn excluded(&self) -> &HashSet<usize> {
        &self.excluded
    }

    pub fn body(&self) -> &ReplayBody {
        &self.body
    }

    /// Address the next attempt to `target_name`.
    pub fn begin_attempt(&mut self, target_name: &str) {
        if self.target_name != target_name {
            self.target_name = target_name.to_string();
        }
    }

    /// Same target, one more try.
    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// Give up on `index`; the next attempt goes elsewhere with a fresh retry budget.
    pub fn record_reroute(&mut self, index: usize) {
        self.excluded.insert(index);
        self.reroutes += 1;
        self.retries = 0;
    }

    pub fn attempt(&self) -> AttemptContext {
        AttemptContext {
            reroutes: self.reroutes,
            retries: self.retries,
            target_name: self.target_name.clone(),
        }
    }
}

fn attempt_in(extensions: &Extensions) -> Option<&AttemptContext> {
    extensions.get::<AttemptContext>()
}

/// Target switches so far for this request (0 if untracked).
pub fn reroutes_from<B>(request: &Request<B>) -> u32 {
    attempt_in(request.extensions()).map_or(0, |a| a.reroutes)
}

/// Same-target retries so far for this request (0 if untracked).
pub fn retries_from<B>(request: &Request<B>) -> u32 {
    attempt_in(request.extensions()).map_or(0, |a| a.retries)
}

/// Name of the target this attempt is addressed to ("" if untracked).
pub fn target_name_from<B>(request: &Request<B>) -> &str {
    attempt_in(request.extensions()).map_or("", |a| a.target_name.as_str())
}

/// Bookkeeping of the attempt that produced `response`, if any.
pub fn attempt_from_response<B>(response: &Response<B>) -> Option<&AttemptContext> {
    attempt_in(response.extensions())
}

/// Best-effort client address for logging: `X-Real-Ip`, then
/// `X-Forwarded-For`, then the socket peer address.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    ["x-real-ip", "x-forwarded-for"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    #[test]
    fn accessors_default_without_context() {
        let request = Request::new(Body::empty());
        assert_eq!(reroutes_from(&request), 0);
        assert_eq!(retries_from(&request), 0);
        assert_eq!(target_name_from(&request), "");
    }

    #[test]
    fn accessors_read_attached_snapshot() {
        let mut ctx = FailoverContext::new(ReplayBody::empty());
        ctx.begin_attempt("alpha");
        ctx.record_retry();
        ctx.record_reroute(0);
        ctx.begin_attempt("beta");
        ctx.record_retry();

        let mut request = Request::new(Body::empty());
        request.extensions_mut().insert(ctx.attempt());
        assert_eq!(reroutes_from(&request), 1);
        assert_eq!(retries_from(&request), 1);
        assert_eq!(target_name_from(&request), "beta");
    }

    #[test]
    fn reroute_resets_retries_and_excludes() {
        let mut ctx = FailoverContext::new(ReplayBody::empty());
        ctx.record_retry();
        ctx.record_retry();
        ctx.record_reroute(3);
        assert_eq!(ctx.retries(), 0);
        assert_eq!(ctx.reroutes(), 1);
        assert!(ctx.excluded().contains(&3));
    }

    #[test]
    fn client_ip_precedence() {
        let remote: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(remote)), "10.0.0.9:5555");
        assert_eq!(client_ip(&headers, None), "");

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 2.2.2.2"));
        assert_eq!(client_ip(&headers, Some(remote)), "1.1.1.1, 2.2.2.2");

        headers.insert("x-real-ip", HeaderValue::from_static(""));
        assert_eq!(client_ip(&headers, Some(remote)), "1.1.1.1, 2.2.2.2");

        headers.insert("x-real-ip", HeaderValue::from_static("3.3.3.3"));
        assert_eq!(client_ip(&headers, Some(remote)), "3.3.3.3");
    }
}
