//! Watchdog configuration: monitoring cadence, per-component resource
//! thresholds, circuit breaker, restart policy, and deadlock detection.

use std::collections::HashMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration_secs;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WatchdogConfig {
    /// How often registered components are polled for health.
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub monitor_interval: Duration,

    /// Per-component resource ceilings, keyed by component name
    /// (`"scanner"`, `"sampler"`).
    pub resource_thresholds: HashMap<String, ResourceThresholds>,

    pub circuit_breaker: CircuitBreakerConfig,

    /// Number of distinct degradation steps a `Degradable` component may be
    /// pushed through before it is considered maximally degraded.
    pub degradation_levels: u8,

    pub restart: RestartConfig,

    pub deadlock_detection: DeadlockConfig,

    pub diagnostic: DiagnosticConfig,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(10),
            resource_thresholds: HashMap::new(),
            circuit_breaker: CircuitBreakerConfig::default(),
            degradation_levels: 3,
            restart: RestartConfig::default(),
            deadlock_detection: DeadlockConfig::default(),
            diagnostic: DiagnosticConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ResourceThresholds {
    pub max_cpu_percent: f64,
    pub max_memory_mb: u64,
    pub max_file_descriptors: u64,
    pub max_tasks: u64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            max_cpu_percent: 5.0,
            max_memory_mb: 256,
            max_file_descriptors: 1024,
            max_tasks: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub reset_timeout: Duration,
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
            half_open_success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RestartConfig {
    pub enabled: bool,
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub graceful_shutdown_timeout: Duration,
    pub max_attempts: u32,
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub backoff_initial: Duration,
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub backoff_max: Duration,
    pub backoff_factor: f64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            graceful_shutdown_timeout: Duration::from_secs(10),
            max_attempts: 5,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(5 * 60),
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DeadlockConfig {
    pub enabled: bool,
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub heartbeat_interval: Duration,
    pub miss_threshold: u32,
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub max_operation_time: Duration,
    pub stack_trace_enabled: bool,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval: Duration::from_secs(5),
            miss_threshold: 3,
            max_operation_time: Duration::from_secs(30),
            stack_trace_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DiagnosticConfig {
    pub max_events: usize,
    pub include_stack_traces: bool,
    pub include_system_metrics: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            max_events: 100,
            include_stack_traces: true,
            include_system_metrics: true,
        }
    }
}

impl WatchdogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::Validation(
                "watchdog.monitor_interval must be positive".into(),
            ));
        }
        if self.degradation_levels == 0 {
            return Err(ConfigError::Validation(
                "watchdog.degradation_levels must be at least 1".into(),
            ));
        }
        if self.circuit_breaker.enabled && self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "watchdog.circuit_breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.restart.enabled {
            if self.restart.max_attempts == 0 {
                return Err(ConfigError::Validation(
                    "watchdog.restart.max_attempts must be at least 1".into(),
                ));
            }
            if self.restart.backoff_factor < 1.0 {
                return Err(ConfigError::Validation(
                    "watchdog.restart.backoff_factor must be >= 1.0".into(),
                ));
            }
            if self.restart.backoff_initial > self.restart.backoff_max {
                return Err(ConfigError::Validation(
                    "watchdog.restart.backoff_initial must not exceed backoff_max".into(),
                ));
            }
        }
        if self.deadlock_detection.enabled && self.deadlock_detection.miss_threshold == 0 {
            return Err(ConfigError::Validation(
                "watchdog.deadlock_detection.miss_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        WatchdogConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let cfg = WatchdogConfig {
            restart: RestartConfig {
                backoff_initial: Duration::from_secs(600),
                backoff_max: Duration::from_secs(60),
                ..RestartConfig::default()
            },
            ..WatchdogConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
