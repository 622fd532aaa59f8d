//! Health check manager: target ownership, scheduler, and selection queries.
//!
//! # Responsibilities
//! - Own the fixed, index-stable list of targets
//! - Periodically probe every target and record the outcome
//! - Answer "next healthy target" queries from request tasks
//! - Accept manual taint overrides and passive outcome feedback
//!
//! # Lifecycle
//! ```text
//! Created → Running → Stopped
//! ```
//! `start` spawns the scheduler on the current Tokio runtime. `stop`
//! signals it and waits for the in-flight tick to finish.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::validation::{validate_health_check, validate_targets};
use crate::config::{HealthCheckConfig, TargetConfig};
use crate::health::error::HealthError;
use crate::health::probe::{HealthProbe, ProbeError};
use crate::health::rolling_window::RollingWindow;
use crate::health::target::{TaintPolicy, Target};
use crate::load_balancer::TargetSelector;
use crate::resilience::timeouts::with_deadline;

/// Owns targets and runs the background health scheduler.
pub struct HealthcheckManager {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

/// State visible to both the scheduler task and request tasks.
struct Shared {
    targets: Vec<Target>,
    config: HealthCheckConfig,
    policy: TaintPolicy,
    probe: Arc<dyn HealthProbe>,
    cursor: AtomicUsize,
}

enum Lifecycle {
    Created,
    Running {
        shutdown: broadcast::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

impl HealthcheckManager {
    /// Build a manager over `targets`. All targets start healthy.
    ///
    /// Fails if the target list or health configuration is incoherent, so
    /// the scheduler can never run with undefined thresholds.
    pub fn new(
        targets: Vec<TargetConfig>,
        config: HealthCheckConfig,
        probe: Arc<dyn HealthProbe>,
    ) -> Result<Self, HealthError> {
        let mut errors = validate_targets(&targets);
        if let Err(health) = validate_health_check(&config) {
            errors.extend(health);
        }
        if !errors.is_empty() {
            return Err(HealthError::InvalidConfig(errors));
        }

        let policy = TaintPolicy::from_config(&config);
        let targets = targets
            .into_iter()
            .enumerate()
            .map(|(index, target)| Target::new(index, target, config.rolling_window_size))
            .collect();

        Ok(Self {
            shared: Arc::new(Shared {
                targets,
                config,
                policy,
                probe,
                cursor: AtomicUsize::new(0),
            }),
            lifecycle: Mutex::new(Lifecycle::Created),
        })
    }

    /// Spawn the periodic scheduler. Must be called within a Tokio runtime.
    pub fn start(&self) -> Result<(), HealthError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Running { .. } => return Err(HealthError::AlreadyStarted),
            Lifecycle::Stopped => return Err(HealthError::AlreadyStopped),
        }

        let (shutdown, rx) = broadcast::channel(1);
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            shared.run(rx).await;
        });

        *lifecycle = Lifecycle::Running { shutdown, handle };
        Ok(())
    }

    /// Stop the scheduler and wait for the current tick to complete.
    pub async fn stop(&self) -> Result<(), HealthError> {
        let (shutdown, handle) = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { shutdown, handle } => (shutdown, handle),
                other => {
                    *lifecycle = other;
                    return Err(HealthError::NotRunning);
                }
            }
        };

        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Health scheduler task ended abnormally");
        }
        tracing::info!("Health check manager stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner),
            Lifecycle::Running { .. }
        )
    }

    /// Run a single probe round immediately, independent of the scheduler.
    pub async fn run_once(&self) {
        self.shared.check_all().await;
    }

    /// Round-robin index of the next untainted target.
    pub fn next_healthy_target_index(&self) -> Option<usize> {
        self.next_healthy_target_index_excluding(&HashSet::new())
    }

    /// Like [`Self::next_healthy_target_index`], never returning an index in `excluded`.
    pub fn next_healthy_target_index_excluding(&self, excluded: &HashSet<usize>) -> Option<usize> {
        let cursor = self.shared.cursor.fetch_add(1, Ordering::Relaxed);
        TargetSelector::select(&self.shared.targets, cursor, excluded)
    }

    pub fn targets(&self) -> &[Target] {
        &self.shared.targets
    }

    pub fn target(&self, index: usize) -> Option<&Target> {
        self.shared.targets.get(index)
    }

    pub fn target_by_name(&self, name: &str) -> Option<&Target> {
        self.shared.targets.iter().find(|t| t.name() == name)
    }

    pub fn rolling_window_by_name(&self, name: &str) -> Option<&RollingWindow> {
        self.target_by_name(name).map(Target::rolling_window)
    }

    /// Administrative taint. Returns whether the flag changed.
    pub fn taint_target(&self, name: &str) -> Result<bool, HealthError> {
        self.target_by_name(name)
            .map(Target::taint)
            .ok_or_else(|| HealthError::UnknownTarget(name.to_string()))
    }

    /// Administrative untaint. Returns whether the flag changed.
    pub fn remove_target_taint(&self, name: &str) -> Result<bool, HealthError> {
        self.target_by_name(name)
            .map(Target::remove_taint)
            .ok_or_else(|| HealthError::UnknownTarget(name.to_string()))
    }

    /// Passive feedback from a forward attempt. Ignored unless enabled.
    pub fn record_request_outcome(&self, index: usize, success: bool) {
        if !self.shared.config.passive_enabled {
            return;
        }
        if let Some(target) = self.shared.targets.get(index) {
            target.record_outcome(success, &self.shared.policy);
        }
    }

    pub fn policy(&self) -> TaintPolicy {
        self.shared.policy
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.shared.config
    }
}

impl Shared {
    async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            targets = self.targets.len(),
            policy = ?self.policy,
            "Health scheduler starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Health scheduler received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    // Runs to completion; shutdown is only observed between ticks.
                    self.check_all().await;
                }
            }
        }
    }

    async fn check_all(&self) {
        join_all(self.targets.iter().map(|target| self.check_target(target))).await;
    }

    async fn check_target(&self, target: &Target) {
        target.reevaluate_window(&self.policy);

        let result = with_deadline(self.config.timeout(), self.probe.check(target.connection()))
            .await
            .unwrap_or(Err(ProbeError::Timeout));

        match &result {
            Ok(()) => {
                tracing::debug!(target_name = %target.name(), "Health probe succeeded");
            }
            Err(e) => {
                tracing::warn!(target_name = %target.name(), error = %e, "Health probe failed");
            }
        }

        target.record_outcome(result.is_ok(), &self.policy);
    }
}
