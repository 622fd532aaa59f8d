//! Fixed-capacity history of recent outcomes.
//!
//! # Responsibilities
//! - Retain at most `capacity` outcomes, oldest evicted first
//! - Report the failure ratio over retained outcomes
//!
//! # Design Decisions
//! - Own lock, independent of the target's state lock, so request feedback
//!   can observe without contending with taint reads
//! - An empty window reports 0.0 and is never considered failing

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Ring buffer of success/failure observations.
#[derive(Debug)]
pub struct RollingWindow {
    capacity: usize,
    observations: Mutex<VecDeque<bool>>,
}

impl RollingWindow {
    /// Create an empty window. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            observations: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record one outcome (`true` = success), evicting the oldest at capacity.
    pub fn observe(&self, success: bool) {
        let mut observations = self
            .observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if observations.len() == self.capacity {
            observations.pop_front();
        }
        observations.push_back(success);
    }

    /// Failures divided by retained observations; 0.0 when empty.
    pub fn failure_ratio(&self) -> f64 {
        let observations = self
            .observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if observations.is_empty() {
            return 0.0;
        }
        let failures = observations.iter().filter(|ok| !**ok).count();
        failures as f64 / observations.len() as f64
    }

    pub fn len(&self) -> usize {
        self.observations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
