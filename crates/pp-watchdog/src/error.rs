//! Watchdog error kinds.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchdogError>;

#[derive(Error, Debug)]
pub enum WatchdogError {
    /// `get_status`, `unregister_component`, or `set_thresholds` named a
    /// component that was never registered, or was registered and then
    /// unregistered.
    #[error("component {0:?} is not registered")]
    NotRegistered(String),

    /// The circuit for this component is `Open`; the caller's operation is
    /// not permitted to proceed.
    #[error("circuit breaker open for component {0:?}")]
    BreakerOpen(String),

    /// A restart attempt exhausted `max_attempts` without the component
    /// reporting a successful start.
    #[error("restart failed for component {0:?}: {1}")]
    RestartFailed(String, String),

    /// A state transition was requested that the watchdog's own FSM does
    /// not permit from its current state (e.g. double-start).
    #[error("invalid state transition: {0}")]
    InvalidState(String),
}
