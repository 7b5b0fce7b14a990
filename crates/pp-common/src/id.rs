//! Process identity types.
//!
//! A process is uniquely identified by the pair (pid, start_time): the pid
//! alone is unstable across reuse, but the OS-reported start time of the
//! process disambiguates a reused pid from the process that held it before.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

/// Complete process identity: (pid, start_time).
///
/// `start_time` is the OS-reported process start time in whatever unit the
/// platform source provides (Unix epoch seconds for the `sysinfo`-backed
/// source); it only needs to be stable and comparable within one host boot,
/// which is the scope the scanner operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: ProcessId,
    pub start_time: u64,
}

impl ProcessIdentity {
    pub fn new(pid: u32, start_time: u64) -> Self {
        ProcessIdentity {
            pid: ProcessId(pid),
            start_time,
        }
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pid, self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_equality_requires_both_fields() {
        let a = ProcessIdentity::new(100, 5000);
        let b = ProcessIdentity::new(100, 5001);
        let c = ProcessIdentity::new(100, 5000);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn display_format() {
        let id = ProcessIdentity::new(42, 123);
        assert_eq!(id.to_string(), "42@123");
    }
}
