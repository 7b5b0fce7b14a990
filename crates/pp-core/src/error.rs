//! `AgentError`: the one error type a caller at the binary boundary sees,
//! folding every subsystem's own error enum in with `#[from]` so internal
//! call sites keep their precise, matchable variants.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] pp_config::ConfigError),

    #[error(transparent)]
    Scan(#[from] pp_scan::ScanError),

    #[error(transparent)]
    Sample(#[from] pp_sample::SampleError),

    #[error(transparent)]
    Sketch(#[from] pp_sketch::SketchError),

    #[error(transparent)]
    Watchdog(#[from] pp_watchdog::WatchdogError),

    #[error("failed to register {component} with the watchdog: {source}")]
    Registration {
        component: &'static str,
        #[source]
        source: pp_watchdog::WatchdogError,
    },
}
