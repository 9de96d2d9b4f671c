//! Configuration module for Slipway.

use crate::error::{Result, SlipwayError};
use crate::types::ReplacePolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main configuration for a Slipway process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlipwayConfig {
    /// Hosting-contract gateway configuration.
    pub gateway: GatewayConfig,
    /// Startup readiness probe configuration.
    pub probe: ProbeConfig,
    /// Lifecycle manager configuration.
    pub lifecycle: LifecycleConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl SlipwayConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SlipwayError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| SlipwayError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.upstream_addr.is_empty() {
            return Err(SlipwayError::InvalidConfig {
                field: "gateway.upstream_addr".to_string(),
                reason: "Upstream address must not be empty".to_string(),
            });
        }

        if self.probe.max_attempts == 0 {
            return Err(SlipwayError::InvalidConfig {
                field: "probe.max_attempts".to_string(),
                reason: "Probe attempt budget must be non-zero".to_string(),
            });
        }

        if self.probe.interval.is_zero() {
            return Err(SlipwayError::InvalidConfig {
                field: "probe.interval".to_string(),
                reason: "Probe interval must be non-zero".to_string(),
            });
        }

        if self.lifecycle.max_poll_attempts == 0 {
            return Err(SlipwayError::InvalidConfig {
                field: "lifecycle.max_poll_attempts".to_string(),
                reason: "Endpoint poll budget must be non-zero".to_string(),
            });
        }

        if self.lifecycle.max_deletion_attempts == 0 {
            return Err(SlipwayError::InvalidConfig {
                field: "lifecycle.max_deletion_attempts".to_string(),
                reason: "Deletion poll budget must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    /// Create a minimal development configuration with short poll intervals.
    pub fn development() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            probe: ProbeConfig {
                interval: Duration::from_millis(250),
                max_attempts: 20,
                path: "/ping".to_string(),
            },
            lifecycle: LifecycleConfig {
                poll_interval: Duration::from_millis(100),
                max_poll_attempts: 50,
                deletion_poll_interval: Duration::from_millis(100),
                max_deletion_attempts: 50,
                replace_policy: ReplacePolicy::Replace,
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Hosting-contract gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the gateway listens on inside the container.
    pub bind_addr: SocketAddr,
    /// Base URL of the wrapped inference server.
    pub upstream_addr: String,
    /// Per-request timeout when forwarding to the upstream.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("valid socket address"),
            upstream_addr: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Startup readiness probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Interval between probe attempts.
    pub interval: Duration,
    /// Maximum consecutive failures before the probe is exhausted.
    pub max_attempts: u32,
    /// Probe path on the gateway.
    pub path: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
            path: "/ping".to_string(),
        }
    }
}

/// Lifecycle manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Interval between endpoint state polls during provisioning.
    pub poll_interval: Duration,
    /// Maximum endpoint state polls before the deployment deadline fires.
    pub max_poll_attempts: u32,
    /// Interval between polls while waiting for a deletion to complete.
    pub deletion_poll_interval: Duration,
    /// Maximum deletion polls per resource before the pass fails.
    pub max_deletion_attempts: u32,
    /// Policy applied when named resources already exist.
    pub replace_policy: ReplacePolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            max_poll_attempts: 120,
            deletion_poll_interval: Duration::from_secs(5),
            max_deletion_attempts: 60,
            replace_policy: ReplacePolicy::Replace,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        assert!(SlipwayConfig::default().validate().is_ok());
        assert!(SlipwayConfig::development().validate().is_ok());
    }

    #[test]
    fn zero_probe_budget_is_rejected() {
        let mut config = SlipwayConfig::default();
        config.probe.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("probe.max_attempts"));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = SlipwayConfig::default();
        config.probe.interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_upstream_is_rejected() {
        let mut config = SlipwayConfig::default();
        config.gateway.upstream_addr.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("upstream_addr"));
    }

    #[test]
    fn config_round_trips_through_file() {
        let config = SlipwayConfig::development();
        let json = serde_json::to_string_pretty(&config).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = SlipwayConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.probe.max_attempts, config.probe.max_attempts);
        assert_eq!(loaded.lifecycle.replace_policy, ReplacePolicy::Replace);
    }
}
