//! Layered configuration resolution: CLI → environment → file → compiled
//! defaults, merged field-by-field so overriding `sampler.top_n` never
//! requires restating the rest of the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::AgentConfig;

/// Locations consulted while resolving configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit `--config` path; if absent, the XDG default is tried.
    pub explicit: Option<PathBuf>,
}

impl ConfigPaths {
    /// `$XDG_CONFIG_HOME/procpulse/config.toml`, falling back to
    /// `~/.config/procpulse/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("procpulse").join("config.toml"))
    }

    pub fn resolve(&self) -> Option<PathBuf> {
        self.explicit.clone().or_else(Self::default_path)
    }
}

/// CLI-supplied overrides, the highest-precedence layer. Every field is
/// optional; `None` means "not passed on the command line."
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub scan_interval_secs: Option<u64>,
    pub top_n: Option<usize>,
    pub max_cpu_usage: Option<f64>,
    pub verbose: bool,
}

/// Load and merge every layer, then validate the result.
///
/// A missing config file is not an error (defaults apply); a present but
/// unparsable one is.
pub fn resolve_config(paths: &ConfigPaths, cli: &CliOverrides) -> Result<AgentConfig> {
    let mut cfg = AgentConfig::default();

    if let Some(path) = paths.resolve() {
        if path.exists() {
            apply_file(&mut cfg, &path)?;
        }
    }

    apply_env(&mut cfg)?;
    apply_cli(&mut cfg, cli);

    cfg.validate()?;
    Ok(cfg)
}

fn apply_file(cfg: &mut AgentConfig, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    // Every leaf field carries `#[serde(default)]`, so a TOML document that
    // only sets `[sampler] top_n = 10` still deserializes every other
    // field from its compiled default rather than failing or zeroing it.
    *cfg = toml::from_str(&text).map_err(|source| ConfigError::Toml {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_duration(key: &str) -> Option<Duration> {
    env_var::<u64>(key).map(Duration::from_secs)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key)
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
}

/// Overlay `PP_SECTION__FIELD[_SECS]` environment variables onto `cfg`.
/// Unset variables leave the current value (file layer or default)
/// untouched.
fn apply_env(cfg: &mut AgentConfig) -> Result<()> {
    let s = &mut cfg.scanner;
    if let Some(v) = env_duration("PP_SCANNER__SCAN_INTERVAL_SECS") {
        s.scan_interval = v;
    }
    if let Some(v) = env_var("PP_SCANNER__MAX_PROCESSES") {
        s.max_processes = v;
    }
    if let Some(v) = env_list("PP_SCANNER__INCLUDE_PATTERNS") {
        s.include_patterns = v;
    }
    if let Some(v) = env_list("PP_SCANNER__EXCLUDE_PATTERNS") {
        s.exclude_patterns = v;
    }
    if let Some(v) = env_var::<String>("PP_SCANNER__PROC_FS_PATH") {
        s.proc_fs_path = v;
    }
    if let Some(v) = env_var("PP_SCANNER__REFRESH_CPU_STATS") {
        s.refresh_cpu_stats = v;
    }
    if let Some(v) = env_var("PP_SCANNER__EVENT_BATCH_SIZE") {
        s.event_batch_size = v;
    }
    if let Some(v) = env_var("PP_SCANNER__EVENT_CHANNEL_SIZE") {
        s.event_channel_size = v;
    }
    if let Some(v) = env_duration("PP_SCANNER__RETRY_INTERVAL_SECS") {
        s.retry_interval = v;
    }
    if let Some(v) = env_var("PP_SCANNER__ADAPTIVE_SAMPLING") {
        s.adaptive_sampling = v;
    }
    if let Some(v) = env_duration("PP_SCANNER__MAX_SCAN_TIME_SECS") {
        s.max_scan_time = v;
    }
    if let Some(v) = env_var("PP_SCANNER__MAX_CPU_USAGE") {
        s.max_cpu_usage = v;
    }

    let p = &mut cfg.sampler;
    if let Some(v) = env_var("PP_SAMPLER__TOP_N") {
        p.top_n = v;
    }
    if let Some(v) = env_var("PP_SAMPLER__CPU_WEIGHT") {
        p.cpu_weight = v;
    }
    if let Some(v) = env_var("PP_SAMPLER__RSS_WEIGHT") {
        p.rss_weight = v;
    }
    if let Some(v) = env_var("PP_SAMPLER__MIN_SCORE") {
        p.min_score = v;
    }
    if let Some(v) = env_var("PP_SAMPLER__STABILITY_FACTOR") {
        p.stability_factor = v;
    }
    if let Some(v) = env_var("PP_SAMPLER__CHURN_HANDLING_ENABLED") {
        p.churn_handling_enabled = v;
    }
    if let Some(v) = env_var("PP_SAMPLER__CHURN_THRESHOLD") {
        p.churn_threshold = v;
    }
    if let Some(v) = env_var("PP_SAMPLER__MAX_SAMPLER_CPU") {
        p.max_sampler_cpu = v;
    }
    if let Some(v) = env_duration("PP_SAMPLER__TAIL_TTL_SECS") {
        p.tail_ttl = v;
    }

    let k = &mut cfg.sketch;
    if let Some(v) = env_var("PP_SKETCH__RELATIVE_ACCURACY") {
        k.relative_accuracy = v;
    }
    if let Some(v) = env_var("PP_SKETCH__MIN_VALUE") {
        k.min_value = v;
    }
    if let Some(v) = env_var("PP_SKETCH__MAX_VALUE") {
        k.max_value = v;
    }
    if let Some(v) = env_var("PP_SKETCH__INITIAL_CAPACITY") {
        k.initial_capacity = v;
    }
    if let Some(v) = env_var("PP_SKETCH__USE_SPARSE_STORE") {
        k.use_sparse_store = v;
    }
    if let Some(v) = env_var("PP_SKETCH__COLLAPSE_THRESHOLD") {
        k.collapse_threshold = v;
    }
    if let Some(v) = env_var("PP_SKETCH__AUTO_SWITCH") {
        k.auto_switch = v;
    }
    if let Some(v) = env_var("PP_SKETCH__SWITCH_THRESHOLD") {
        k.switch_threshold = v;
    }

    let w = &mut cfg.watchdog;
    if let Some(v) = env_duration("PP_WATCHDOG__MONITOR_INTERVAL_SECS") {
        w.monitor_interval = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__DEGRADATION_LEVELS") {
        w.degradation_levels = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__CIRCUIT_BREAKER__ENABLED") {
        w.circuit_breaker.enabled = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__CIRCUIT_BREAKER__FAILURE_THRESHOLD") {
        w.circuit_breaker.failure_threshold = v;
    }
    if let Some(v) = env_duration("PP_WATCHDOG__CIRCUIT_BREAKER__RESET_TIMEOUT_SECS") {
        w.circuit_breaker.reset_timeout = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__RESTART__ENABLED") {
        w.restart.enabled = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__RESTART__MAX_ATTEMPTS") {
        w.restart.max_attempts = v;
    }
    if let Some(v) = env_duration("PP_WATCHDOG__RESTART__BACKOFF_INITIAL_SECS") {
        w.restart.backoff_initial = v;
    }
    if let Some(v) = env_duration("PP_WATCHDOG__RESTART__BACKOFF_MAX_SECS") {
        w.restart.backoff_max = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__RESTART__BACKOFF_FACTOR") {
        w.restart.backoff_factor = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__DEADLOCK_DETECTION__ENABLED") {
        w.deadlock_detection.enabled = v;
    }
    if let Some(v) = env_duration("PP_WATCHDOG__DEADLOCK_DETECTION__HEARTBEAT_INTERVAL_SECS") {
        w.deadlock_detection.heartbeat_interval = v;
    }
    if let Some(v) = env_var("PP_WATCHDOG__DEADLOCK_DETECTION__MISS_THRESHOLD") {
        w.deadlock_detection.miss_threshold = v;
    }

    Ok(())
}

fn apply_cli(cfg: &mut AgentConfig, cli: &CliOverrides) {
    if let Some(v) = cli.scan_interval_secs {
        cfg.scanner.scan_interval = Duration::from_secs(v);
    }
    if let Some(v) = cli.top_n {
        cfg.sampler.top_n = v;
    }
    if let Some(v) = cli.max_cpu_usage {
        cfg.scanner.max_cpu_usage = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let paths = ConfigPaths {
            explicit: Some(PathBuf::from("/nonexistent/procpulse/config.toml")),
        };
        let cfg = resolve_config(&paths, &CliOverrides::default()).unwrap();
        assert_eq!(cfg.sampler.top_n, 50);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sampler]\ntop_n = 10\n").unwrap();
        let paths = ConfigPaths {
            explicit: Some(file.path().to_path_buf()),
        };
        let cfg = resolve_config(&paths, &CliOverrides::default()).unwrap();
        assert_eq!(cfg.sampler.top_n, 10);
        assert_eq!(cfg.sampler.cpu_weight, 0.7); // untouched default
    }

    #[test]
    fn cli_overrides_win_over_file_and_defaults() {
        let cli = CliOverrides {
            top_n: Some(7),
            ..Default::default()
        };
        let cfg = resolve_config(&ConfigPaths::default(), &cli).unwrap();
        assert_eq!(cfg.sampler.top_n, 7);
    }
}
