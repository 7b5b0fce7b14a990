//! Scanner error kinds.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    /// Enumerating the process table failed; transient, the next cycle
    /// retries.
    #[error("process enumeration failed: {0}")]
    PlatformError(String),

    /// An include/exclude pattern failed to compile. Caught at
    /// construction time, never mid-scan.
    #[error("pattern compile error: {0}")]
    PatternCompileError(#[from] regex::Error),

    /// The event channel rejected an enqueue within the configured wait.
    #[error("event channel full, event dropped")]
    ChannelFull,

    /// A state transition was requested that the FSM does not permit from
    /// its current state.
    #[error("invalid state transition: {0}")]
    InvalidState(String),
}
