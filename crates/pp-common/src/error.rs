//! Error kinds shared across subsystem crates.
//!
//! Configuration and state-machine errors are common enough (every
//! subsystem validates config and every subsystem has an FSM) that they
//! live here rather than being duplicated per crate. Subsystem-specific
//! kinds (`EmptySketch`, `ChannelFull`, `BreakerOpen`, ...) stay in their
//! owning crate's error enum and get folded into `pp_core::AgentError` at
//! the agent-shell boundary instead.

use thiserror::Error;

/// Result type alias using the common `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors common to configuration loading and subsystem state machines.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration failed validation; never downgraded to a diagnostic.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A subsystem was asked to transition from a state that does not
    /// permit the requested transition (e.g. double-start, stop when not
    /// running).
    #[error("invalid state transition: {0}")]
    InvalidState(String),

    /// An include/exclude pattern failed to compile as a regular
    /// expression.
    #[error("pattern compile error: {0}")]
    PatternCompileError(String),
}
