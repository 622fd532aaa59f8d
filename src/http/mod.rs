//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, request timeout)
//!     → body.rs (capture body once, size limit)
//!     → [resilience::failover picks targets and loops on failure]
//!     → request.rs (rebuild the request for each attempt)
//!     → forwarder.rs (rewrite URI, send, classify outcome)
//!     → Send upstream response to client
//! ```
//!
//! client.rs builds the pooled http/https client used for every upstream
//! call. context.rs carries the per-request retry/reroute bookkeeping.

pub mod body;
pub mod client;
pub mod context;
pub mod forwarder;
pub mod request;
pub mod server;

pub use context::{client_ip, reroutes_from, retries_from, target_name_from, AttemptContext};
pub use forwarder::{ForwardOutcome, Forwarder, HyperForwarder, TransportError};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
