//! Typed configuration, layered resolution, and validation for the agent.
//!
//! This crate provides:
//! - Typed Rust structs mirroring the on-disk TOML schema, one per
//!   subsystem (`ScannerConfig`, `SamplerConfig`, `SketchConfig`,
//!   `WatchdogConfig`) composed into a top-level `AgentConfig`
//! - `schemars`-derived JSON Schema for external validation/editor support
//! - Layered resolution: CLI flags → environment → config file → defaults
//! - Whole-config semantic validation, run once at startup

mod duration_secs;
pub mod error;
pub mod resolve;
pub mod sampler;
pub mod scanner;
pub mod sketch;
mod validate;
pub mod watchdog;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{ConfigError, Result};
pub use resolve::{resolve_config, CliOverrides, ConfigPaths};
pub use sampler::SamplerConfig;
pub use scanner::ScannerConfig;
pub use sketch::SketchConfig;
pub use watchdog::{
    CircuitBreakerConfig, DeadlockConfig, DiagnosticConfig, ResourceThresholds, RestartConfig,
    WatchdogConfig,
};

/// Schema version for the on-disk configuration file.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// The complete, validated configuration for one agent instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AgentConfig {
    pub scanner: ScannerConfig,
    pub sampler: SamplerConfig,
    pub sketch: SketchConfig,
    pub watchdog: WatchdogConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            sampler: SamplerConfig::default(),
            sketch: SketchConfig::default(),
            watchdog: WatchdogConfig::default(),
        }
    }
}
