//! Whole-config validation: each subsystem validates its own section, then
//! this module checks cross-section invariants.

use crate::error::Result;
use crate::AgentConfig;

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        self.scanner.validate()?;
        self.sampler.validate()?;
        self.sketch.validate()?;
        self.watchdog.validate()?;
        Ok(())
    }
}
