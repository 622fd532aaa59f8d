//! Health subsystem errors.

use thiserror::Error;

use crate::config::ValidationError;

/// Errors reported by the health check manager.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Construction rejected the configuration.
    #[error("invalid health check configuration: {}", describe(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// `start` called on a running manager.
    #[error("health check manager already started")]
    AlreadyStarted,

    /// `start` called after `stop`.
    #[error("health check manager already stopped")]
    AlreadyStopped,

    /// `stop` called on a manager that is not running.
    #[error("health check manager is not running")]
    NotRunning,

    #[error("unknown target '{0}'")]
    UnknownTarget(String),
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
