//! DDSketch Engine configuration.
//!
//! Kept separate from `pp_sketch::DDSketchConfig`/`SketchTuning` so this
//! crate has no dependency on `pp-sketch`: `pp-core` converts between the
//! two at wiring time, matching the teacher's separation between typed
//! config crates and the engines they parameterize.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SketchConfig {
    /// Relative-accuracy parameter (gamma); quantiles are guaranteed
    /// within this fraction of the true value.
    pub relative_accuracy: f64,

    /// Smallest magnitude the sketch's mapping can represent.
    pub min_value: f64,

    /// Largest magnitude the sketch's mapping can represent.
    pub max_value: f64,

    /// Starting capacity hint for the active store (informational; stores
    /// grow on demand regardless).
    pub initial_capacity: usize,

    /// Whether a freshly constructed sketch starts in the sparse shape.
    pub use_sparse_store: bool,

    /// Per-bucket count below which a bucket becomes a collapse candidate
    /// once the sparse store exceeds its bucket ceiling.
    pub collapse_threshold: u64,

    /// Whether the store shape switches automatically based on density.
    pub auto_switch: bool,

    /// Density threshold governing sparse/dense switching.
    pub switch_threshold: f64,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            relative_accuracy: 0.0075,
            min_value: 1e-9,
            max_value: 1e9,
            initial_capacity: 128,
            use_sparse_store: true,
            collapse_threshold: 2,
            auto_switch: true,
            switch_threshold: 0.3,
        }
    }
}

impl SketchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.relative_accuracy > 0.0 && self.relative_accuracy < 1.0) {
            return Err(ConfigError::Validation(format!(
                "sketch.relative_accuracy must be in (0, 1), got {}",
                self.relative_accuracy
            )));
        }
        if !(self.min_value > 0.0 && self.min_value < self.max_value) {
            return Err(ConfigError::Validation(format!(
                "sketch requires 0 < min_value < max_value, got min_value={} max_value={}",
                self.min_value, self.max_value
            )));
        }
        if !(0.0..=1.0).contains(&self.switch_threshold) {
            return Err(ConfigError::Validation(
                "sketch.switch_threshold must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
