//! Failover reverse proxy library.
//!
//! Forwards HTTP requests to one of several redundant upstream targets,
//! tainting unhealthy targets in the background and retrying or rerouting
//! requests whose attempt fails at the transport level.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
