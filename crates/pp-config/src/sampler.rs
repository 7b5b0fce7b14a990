//! Top-N Sampler configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration_secs;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of processes retained as explicit rows; the remainder is
    /// folded into the tail aggregate.
    pub top_n: usize,

    /// Weight on normalized CPU usage in the composite score.
    pub cpu_weight: f64,

    /// Weight on normalized RSS in the composite score.
    pub rss_weight: f64,

    /// Processes scoring below this are dropped entirely rather than
    /// ranked, even if `top_n` has not been filled.
    pub min_score: f64,

    /// Exponential-smoothing factor applied to a process's rank across
    /// cycles, damping churn at the tail of the Top-N boundary.
    pub stability_factor: f64,

    /// Whether the churn circuit breaker is active.
    pub churn_handling_enabled: bool,

    /// Combined creation+termination rate (events/sec) above which churn
    /// handling engages.
    pub churn_threshold: f64,

    /// Ceiling on the sampler's own CPU usage, percent of a single core.
    pub max_sampler_cpu: f64,

    /// How long a tail-aggregate entry survives with no fresh observations
    /// before it is evicted.
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub tail_ttl: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            cpu_weight: 0.7,
            rss_weight: 0.3,
            min_score: 0.0,
            stability_factor: 0.3,
            churn_handling_enabled: true,
            churn_threshold: 10.0,
            max_sampler_cpu: 5.0,
            tail_ttl: Duration::from_secs(300),
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(ConfigError::Validation(
                "sampler.top_n must be at least 1".into(),
            ));
        }
        for (name, w) in [
            ("cpu_weight", self.cpu_weight),
            ("rss_weight", self.rss_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "sampler.{name} must be finite and non-negative, got {w}"
                )));
            }
        }
        if self.cpu_weight + self.rss_weight <= 0.0 {
            return Err(ConfigError::Validation(
                "sampler.cpu_weight + sampler.rss_weight must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.stability_factor) || self.stability_factor <= 0.0 {
            return Err(ConfigError::Validation(
                "sampler.stability_factor must be in (0, 1]".into(),
            ));
        }
        if self.tail_ttl.is_zero() {
            return Err(ConfigError::Validation(
                "sampler.tail_ttl must be positive".into(),
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
        SamplerConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let cfg = SamplerConfig {
            top_n: 0,
            ..SamplerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stability_factor_out_of_range_is_rejected() {
        let cfg = SamplerConfig {
            stability_factor: 1.5,
            ..SamplerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
