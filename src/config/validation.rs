//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ratios within bounds)
//! - Check target identity (unique, non-empty names; parseable URLs)
//! - Enforce a coherent tainting mode
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{HealthCheckConfig, ProxyConfig, TargetConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no targets configured")]
    NoTargets,

    #[error("target #{0} has an empty name")]
    EmptyTargetName(usize),

    #[error("duplicate target name '{0}'")]
    DuplicateTargetName(String),

    #[error("target '{name}' has invalid url '{url}': {reason}")]
    InvalidTargetUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("rolling_window_failure_threshold must be in (0, 1], got {0}")]
    RatioOutOfRange(f64),
}

/// Validate the whole proxy configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_targets(&config.targets);

    if let Err(health) = validate_health_check(&config.health_check) {
        errors.extend(health);
    }

    if config.failover.upstream_timeout_ms == 0 {
        errors.push(ValidationError::Zero("failover.upstream_timeout_ms"));
    }
    if config.failover.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("failover.request_timeout_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the health check section on its own.
///
/// The rolling window settings are only checked when rolling-window
/// tainting is enabled.
pub fn validate_health_check(config: &HealthCheckConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.interval_ms == 0 {
        errors.push(ValidationError::Zero("health_check.interval_ms"));
    }
    if config.timeout_ms == 0 {
        errors.push(ValidationError::Zero("health_check.timeout_ms"));
    }

    if config.rolling_window_taint_enabled {
        if config.rolling_window_size == 0 {
            errors.push(ValidationError::Zero("health_check.rolling_window_size"));
        }
        let ratio = config.rolling_window_failure_threshold;
        if !(ratio > 0.0 && ratio <= 1.0) {
            errors.push(ValidationError::RatioOutOfRange(ratio));
        }
    } else {
        if config.failure_threshold == 0 {
            errors.push(ValidationError::Zero("health_check.failure_threshold"));
        }
        if config.success_threshold == 0 {
            errors.push(ValidationError::Zero("health_check.success_threshold"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the target list: non-empty, unique names, usable URLs.
pub fn validate_targets(targets: &[TargetConfig]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if targets.is_empty() {
        errors.push(ValidationError::NoTargets);
        return errors;
    }

    let mut seen = HashSet::new();
    for (index, target) in targets.iter().enumerate() {
        if target.name.trim().is_empty() {
            errors.push(ValidationError::EmptyTargetName(index));
        } else if !seen.insert(target.name.as_str()) {
            errors.push(ValidationError::DuplicateTargetName(target.name.clone()));
        }

        let url = &target.connection.http.url;
        let reason = match Url::parse(url) {
            Ok(parsed) if !matches!(parsed.scheme(), "http" | "https") => {
                Some(format!("unsupported scheme '{}'", parsed.scheme()))
            }
            Ok(parsed) if parsed.host_str().is_none() => Some("missing host".to_string()),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            errors.push(ValidationError::InvalidTargetUrl {
                name: target.name.clone(),
                url: url.clone(),
                reason,
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.targets.push(TargetConfig::http("a", "http://127.0.0.1:8545"));
        config.targets.push(TargetConfig::http("b", "https://rpc.example.com/key"));
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid_config();
        config.targets.push(TargetConfig::http("a", "ftp://nowhere"));
        config.health_check.interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateTargetName("a".into())));
        assert!(errors.contains(&ValidationError::Zero("health_check.interval_ms")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidTargetUrl { name, .. } if name == "a")));
    }

    #[test]
    fn empty_target_list_is_rejected() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoTargets]);
    }

    #[test]
    fn rolling_window_requires_size_and_ratio() {
        let config = HealthCheckConfig {
            rolling_window_taint_enabled: true,
            rolling_window_size: 0,
            rolling_window_failure_threshold: 1.5,
            ..HealthCheckConfig::default()
        };
        let errors = validate_health_check(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::Zero("health_check.rolling_window_size")));
        assert!(errors.contains(&ValidationError::RatioOutOfRange(1.5)));
    }

    #[test]
    fn rolling_window_settings_ignored_when_disabled() {
        let config = HealthCheckConfig {
            rolling_window_taint_enabled: false,
            rolling_window_size: 0,
            rolling_window_failure_threshold: 0.0,
            ..HealthCheckConfig::default()
        };
        assert_eq!(validate_health_check(&config), Ok(()));
    }
}
