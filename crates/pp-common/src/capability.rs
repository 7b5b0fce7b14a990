//! The duck-typed capability sets a Watchdog-registered component may
//! expose: `Monitorable` is mandatory, `Restartable` and `Degradable` are
//! declared independently as optional arguments to
//! `pp_watchdog::Watchdog::register_component` rather than inherited,
//! matching the contract's "duck-typed interfaces ... discovered at
//! registration, not by inheritance." Lives here rather than in
//! `pp-watchdog` itself so `Scanner` and `Sampler` can implement these
//! traits without either of their crates depending on the watchdog.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed, `Send` future, for the handful of capability methods that need
/// to await I/O (a graceful shutdown, a restart) without making the trait
/// itself generic or `async fn`-in-trait (which is not object-safe). This
/// is the same "boxed future behind a plain method" shape `tokio::spawn`
/// itself uses internally.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Resource usage of one monitored component, read once per monitor tick.
/// Mirrors the four thresholds `pp_config::ResourceThresholds` can bound;
/// there is no `gc_percent` field because this is a `tokio` reimplementation
/// with no garbage collector to report on (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComponentResourceUsage {
    /// Percent of a single core.
    pub cpu_percent: f64,
    pub memory_mb: u64,
    pub file_descriptors: u64,
    /// Count of `tokio` tasks this component currently has outstanding.
    pub tasks: u64,
}

/// A component's self-reported health, independent of the resource
/// thresholds the watchdog checks externally. A component that is busy but
/// within its resource budget can still flag itself `Degraded` (e.g. "my
/// upstream is slow") so the watchdog's degradation stepping has more
/// signal than raw CPU/memory alone.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Mandatory capability: every registered component can report its own
/// resource usage and health.
pub trait Monitorable: Send + Sync {
    fn resource_usage(&self) -> ComponentResourceUsage;
    fn health(&self) -> HealthStatus;
}

/// Optional capability: a component the watchdog may stop and restart when
/// its circuit opens.
pub trait Restartable: Send + Sync {
    /// Ask the component to stop within `deadline`. Errors are logged but
    /// otherwise ignored by the restart policy, which proceeds to `start`
    /// regardless (a component that fails to shut down gracefully still
    /// needs to be started again, not left half-dead).
    fn shutdown(&self, deadline: Duration) -> BoxFuture<'_, Result<(), String>>;
    fn start(&self) -> BoxFuture<'_, Result<(), String>>;
    fn is_running(&self) -> bool;
}

/// Optional capability: a component whose workload the watchdog can step
/// down (and back up) in response to sustained resource pressure.
pub trait Degradable: Send + Sync {
    fn set_degradation_level(&self, level: u8) -> Result<(), String>;
    fn get_degradation_level(&self) -> u8;
}
