//! `ProcessSource`: the trait boundary between the scanner's diff/filter
//! logic and the concrete host-enumeration backend, so the scan cycle
//! never branches on which backend is in use.

mod memory;
mod sysinfo_backend;

pub use memory::InMemoryProcessSource;
pub use sysinfo_backend::SysinfoProcessSource;

use pp_common::ProcessInfo;

use crate::error::Result;

/// Resource usage of the scanner process itself, read each cycle to drive
/// adaptive interval control.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceUsage {
    /// Percent of a single core.
    pub cpu_percent: f64,
    pub memory_bytes: u64,
}

pub trait ProcessSource: Send {
    /// Enumerate every process currently visible to this source.
    fn scan(&mut self) -> Result<Vec<ProcessInfo>>;

    /// Resource usage of the scanner's own process, for adaptive rate
    /// control and the Watchdog's `Monitorable` capability.
    fn self_usage(&mut self) -> Result<ResourceUsage>;
}
