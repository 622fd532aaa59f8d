//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the failover proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Ordered list of upstream targets. Position is the target's index.
    pub targets: Vec<TargetConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Retry / reroute budgets and upstream timeouts.
    pub failover: FailoverConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A single upstream target.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetConfig {
    /// Unique target identifier.
    pub name: String,

    /// How to reach the target.
    pub connection: TargetConnection,
}

impl TargetConfig {
    /// Shorthand for an HTTP target without request compression support.
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: TargetConnection::http(url),
        }
    }
}

/// Connection settings of a target.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetConnection {
    pub http: TargetConnectionHttp,
}

impl TargetConnection {
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            http: TargetConnectionHttp {
                url: url.into(),
                compression: false,
            },
        }
    }
}

/// HTTP connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TargetConnectionHttp {
    /// Upstream URL. Its path replaces the inbound request path.
    pub url: String,

    /// Whether the target accepts gzip-encoded request bodies.
    #[serde(default)]
    pub compression: bool,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Consecutive failures before a target is tainted.
    pub failure_threshold: u32,

    /// Consecutive successes before a tainted target is restored.
    pub success_threshold: u32,

    /// Taint by failure ratio over a rolling window instead of streaks.
    pub rolling_window_taint_enabled: bool,

    /// Number of outcomes kept in each target's rolling window.
    pub rolling_window_size: usize,

    /// Failure ratio in (0, 1] at or above which a target is tainted.
    pub rolling_window_failure_threshold: f64,

    /// Feed forward-attempt outcomes back into target health.
    pub passive_enabled: bool,

    /// JSON-RPC method used by the health probe.
    pub probe_method: String,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            timeout_ms: 2_000,
            failure_threshold: 3,
            success_threshold: 2,
            rolling_window_taint_enabled: false,
            rolling_window_size: 100,
            rolling_window_failure_threshold: 0.9,
            passive_enabled: true,
            probe_method: "eth_blockNumber".to_string(),
        }
    }
}

/// Retry and reroute budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Same-target retries before switching target.
    pub max_retries: u32,

    /// Target switches allowed per inbound request. Checked before each
    /// switch, so this is the exact number of switches, not attempts.
    pub max_reroutes: u32,

    /// Deadline for a single forward attempt, in milliseconds.
    pub upstream_timeout_ms: u64,

    /// Deadline for the whole inbound request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum buffered request body size in bytes.
    pub max_body_size: usize,
}

impl FailoverConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            max_reroutes: 2,
            upstream_timeout_ms: 10_000,
            request_timeout_secs: 60,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin API under `/admin`.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [[targets]]
            name = "primary"
            connection = { http = { url = "http://127.0.0.1:8545" } }
            "#,
        )
        .unwrap();

        assert_eq!(config.targets.len(), 1);
        assert!(!config.targets[0].connection.http.compression);
        assert_eq!(config.health_check.failure_threshold, 3);
        assert!(!config.health_check.rolling_window_taint_enabled);
        assert_eq!(config.failover.max_reroutes, 2);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn rolling_window_section_parses() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [health_check]
            interval_ms = 200
            rolling_window_taint_enabled = true
            rolling_window_size = 2
            rolling_window_failure_threshold = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(config.health_check.interval(), Duration::from_millis(200));
        assert_eq!(config.health_check.rolling_window_size, 2);
        assert!(config.health_check.rolling_window_taint_enabled);
    }
}
