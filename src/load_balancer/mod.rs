//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request needs a target
//!     → HealthcheckManager advances its round-robin cursor
//!     → selector.rs scans from the cursor, skipping tainted and excluded targets
//!     → Return target index or None
//! ```
//!
//! # Design Decisions
//! - Selector is stateless; the manager owns the cursor and the targets
//! - Indices are stable for the process lifetime (fixed target list)
//! - Tainted targets excluded from selection
//! - Round-robin with skip is the only strategy

pub mod selector;

pub use selector::TargetSelector;
