//! Per-target health record.
//!
//! # States
//! - Healthy: target receives new requests
//! - Tainted: target skipped by selection
//!
//! # State Transitions
//! ```text
//! Consecutive mode:
//!     Healthy → Tainted: consecutive failures >= failure_threshold
//!     Tainted → Healthy: consecutive successes >= success_threshold
//!
//! Rolling-window mode:
//!     Healthy → Tainted: window failure ratio >= threshold (on any outcome)
//!     Tainted → Healthy: ratio < threshold at the next scheduler tick
//! ```
//!
//! # Design Decisions
//! - One lock per target; never held across probe I/O
//! - Streak counters reset whenever the outcome flips
//! - Transitions are edge-triggered: logged once per change

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{HealthCheckConfig, TargetConfig, TargetConnection};
use crate::health::rolling_window::RollingWindow;
use crate::observability::metrics;

/// How outcomes turn into taint decisions. Selected globally by configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaintPolicy {
    /// Streak counting with hysteresis.
    Consecutive {
        failure_threshold: u32,
        success_threshold: u32,
    },
    /// Failure ratio over the target's rolling window.
    RollingWindow { failure_threshold: f64 },
}

impl TaintPolicy {
    pub fn from_config(config: &HealthCheckConfig) -> Self {
        if config.rolling_window_taint_enabled {
            TaintPolicy::RollingWindow {
                failure_threshold: config.rolling_window_failure_threshold,
            }
        } else {
            TaintPolicy::Consecutive {
                failure_threshold: config.failure_threshold,
                success_threshold: config.success_threshold,
            }
        }
    }
}

/// Mutable health fields, guarded by the target's lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetState {
    pub tainted: bool,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

/// One upstream target: immutable identity plus guarded health state.
#[derive(Debug)]
pub struct Target {
    index: usize,
    name: String,
    connection: TargetConnection,
    state: RwLock<TargetState>,
    window: RollingWindow,
}

impl Target {
    /// Create a healthy target at `index`.
    pub fn new(index: usize, config: TargetConfig, window_size: usize) -> Self {
        Self {
            index,
            name: config.name,
            connection: config.connection,
            state: RwLock::new(TargetState::default()),
            window: RollingWindow::new(window_size),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &TargetConnection {
        &self.connection
    }

    pub fn rolling_window(&self) -> &RollingWindow {
        &self.window
    }

    /// Snapshot of the guarded fields.
    pub fn state(&self) -> TargetState {
        *self.read()
    }

    pub fn is_tainted(&self) -> bool {
        self.read().tainted
    }

    /// Mark the target ineligible. Returns true if this changed the state.
    pub fn taint(&self) -> bool {
        let mut state = self.write();
        self.transition(&mut state, true, "manual")
    }

    /// Clear the taint. No-op on a healthy target.
    pub fn remove_taint(&self) -> bool {
        let mut state = self.write();
        self.transition(&mut state, false, "manual")
    }

    /// Apply one probe or request outcome under the given policy.
    pub fn record_outcome(&self, success: bool, policy: &TaintPolicy) {
        // Window has its own lock; observe before taking ours.
        let ratio = match policy {
            TaintPolicy::RollingWindow { .. } => {
                self.window.observe(success);
                Some(self.window.failure_ratio())
            }
            TaintPolicy::Consecutive { .. } => None,
        };

        let mut state = self.write();
        if success {
            state.consecutive_successes = state.consecutive_successes.saturating_add(1);
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            state.consecutive_successes = 0;
        }

        match (*policy, ratio) {
            (
                TaintPolicy::Consecutive {
                    failure_threshold,
                    success_threshold,
                },
                _,
            ) => {
                if !state.tainted && state.consecutive_failures >= failure_threshold {
                    self.transition(&mut state, true, "consecutive failures");
                } else if state.tainted && state.consecutive_successes >= success_threshold {
                    self.transition(&mut state, false, "consecutive successes");
                }
            }
            (TaintPolicy::RollingWindow { failure_threshold }, Some(ratio)) => {
                if ratio >= failure_threshold {
                    self.transition(&mut state, true, "failure ratio");
                }
            }
            (TaintPolicy::RollingWindow { .. }, None) => {}
        }
    }

    /// Re-derive the taint flag from the current window ratio.
    ///
    /// Only meaningful in rolling-window mode, where this is the sole path
    /// back to healthy. Called once per target at the start of every tick.
    pub fn reevaluate_window(&self, policy: &TaintPolicy) {
        let TaintPolicy::RollingWindow { failure_threshold } = *policy else {
            return;
        };
        let ratio = self.window.failure_ratio();
        let mut state = self.write();
        self.transition(&mut state, ratio >= failure_threshold, "window re-evaluation");
    }

    fn transition(&self, state: &mut TargetState, tainted: bool, reason: &str) -> bool {
        if state.tainted == tainted {
            return false;
        }
        state.tainted = tainted;
        if tainted {
            tracing::warn!(
                target_name = %self.name,
                index = self.index,
                reason,
                consecutive_failures = state.consecutive_failures,
                failure_ratio = self.window.failure_ratio(),
                "Target tainted"
            );
        } else {
            tracing::info!(
                target_name = %self.name,
                index = self.index,
                reason,
                "Target restored"
            );
        }
        metrics::record_target_health(&self.name, !tainted);
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, TargetState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TargetState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
