//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (manager.rs + probe.rs):
//!     Periodic timer
//!     → Re-evaluate rolling windows
//!     → Probe every target concurrently (bounded by timeout)
//!     → Record outcome in target.rs
//!
//! Passive health checks (manager.rs):
//!     Forward attempt finished
//!     → record_request_outcome
//!     → Record outcome in target.rs
//!
//! State machine (target.rs):
//!     Healthy ←→ Tainted
//!     Streak thresholds or rolling-window failure ratio
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - Health state is per-target, each target with its own lock
//! - Target list is fixed at construction; indices are stable

pub mod error;
pub mod manager;
pub mod probe;
pub mod rolling_window;
pub mod target;

pub use error::HealthError;
pub use manager::HealthcheckManager;
pub use probe::{HealthProbe, JsonRpcProbe, ProbeError};
pub use rolling_window::RollingWindow;
pub use target::{TaintPolicy, Target, TargetState};
