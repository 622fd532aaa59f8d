//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (body already captured):
//!     → failover.rs (select target, forward, decide retry / reroute / give up)
//!     → timeouts.rs (every attempt and probe has a deadline)
//!     → error.rs (terminal failures rendered for the client)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only transport failures are retried; HTTP responses pass through
//! - Retry/reroute budgets are per request, not global

pub mod error;
pub mod failover;
pub mod timeouts;

pub use error::FailoverError;
pub use failover::{FailoverOrchestrator, FailoverPolicy};
pub use timeouts::{with_deadline, DeadlineExceeded};
