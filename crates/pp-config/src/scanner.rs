//! Process Scanner configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration_secs;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScannerConfig {
    /// How often the scanner polls the process table, before adaptive
    /// back-off is applied.
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub scan_interval: Duration,

    /// Hard cap on tracked processes per cycle; 0 means unlimited.
    pub max_processes: usize,

    /// Command-line/name patterns that, if non-empty, a process must match
    /// to be tracked at all.
    pub include_patterns: Vec<String>,

    /// Patterns that exclude an otherwise-included process.
    pub exclude_patterns: Vec<String>,

    /// Root of the procfs-like tree to scan; ignored by backends that do
    /// not read `/proc` directly (e.g. a non-Linux `sysinfo` backend).
    pub proc_fs_path: String,

    /// Whether to read per-process CPU stats each cycle (disabling saves
    /// scan time on hosts with very large process counts).
    pub refresh_cpu_stats: bool,

    /// Maximum number of diff events flushed to the channel per cycle.
    pub event_batch_size: usize,

    /// Capacity of the bounded event channel.
    pub event_channel_size: usize,

    /// Delay before retrying a cycle that failed to enumerate processes.
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub retry_interval: Duration,

    /// Whether the scan interval grows when the scanner's own CPU usage
    /// exceeds `max_cpu_usage`.
    pub adaptive_sampling: bool,

    /// Upper bound on how long a single scan cycle is allowed to run.
    #[serde(with = "duration_secs")]
    #[schemars(with = "u64")]
    pub max_scan_time: Duration,

    /// Ceiling on the scanner's own CPU usage, percent of a single core.
    pub max_cpu_usage: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(5),
            max_processes: 0,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            proc_fs_path: "/proc".to_string(),
            refresh_cpu_stats: true,
            event_batch_size: 256,
            event_channel_size: 1024,
            retry_interval: Duration::from_secs(1),
            adaptive_sampling: true,
            max_scan_time: Duration::from_secs(2),
            max_cpu_usage: 5.0,
        }
    }
}

impl ScannerConfig {
    /// Compile `include_patterns`/`exclude_patterns` eagerly so a bad
    /// pattern fails at load time, never mid-scan.
    pub fn compile_patterns(&self) -> Result<(regex::RegexSet, regex::RegexSet)> {
        let include = regex::RegexSet::new(&self.include_patterns).map_err(ConfigError::from)?;
        let exclude = regex::RegexSet::new(&self.exclude_patterns).map_err(ConfigError::from)?;
        Ok((include, exclude))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval.is_zero() {
            return Err(ConfigError::Validation(
                "scanner.scan_interval must be positive".into(),
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(ConfigError::Validation(
                "scanner.retry_interval must be positive".into(),
            ));
        }
        if self.max_scan_time.is_zero() {
            return Err(ConfigError::Validation(
                "scanner.max_scan_time must be positive".into(),
            ));
        }
        if self.event_batch_size == 0 {
            return Err(ConfigError::Validation(
                "scanner.event_batch_size must be at least 1".into(),
            ));
        }
        if self.event_channel_size == 0 {
            return Err(ConfigError::Validation(
                "scanner.event_channel_size must be at least 1".into(),
            ));
        }
        if !self.max_cpu_usage.is_finite() || self.max_cpu_usage <= 0.0 {
            return Err(ConfigError::Validation(
                "scanner.max_cpu_usage must be a positive, finite percent".into(),
            ));
        }
        self.compile_patterns()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ScannerConfig::default().validate().unwrap();
    }

    #[test]
    fn bad_pattern_fails_at_validate() {
        let cfg = ScannerConfig {
            include_patterns: vec!["(unclosed".to_string()],
            ..ScannerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_scan_interval_is_rejected() {
        let cfg = ScannerConfig {
            scan_interval: Duration::ZERO,
            ..ScannerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
