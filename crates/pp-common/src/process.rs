//! The per-process snapshot and the types derived from comparing two of
//! them across a scan cycle. Shared by `pp-scan` (which produces these),
//! `pp-sample` (which consumes and scores them), and `pp-core` (which
//! serializes them into a `ProcessEnvelope`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::id::{ProcessId, ProcessIdentity};

/// Coarse process run-state, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Sleeping,
    Waiting,
    Stopped,
    Zombie,
    Unknown,
}

/// A single process observation.
///
/// Identity is the `(pid, start_time)` pair, not `pid` alone: pids are
/// reused by the OS, so a bare pid cannot distinguish a long-lived daemon
/// from a brand-new process that happened to land on the same number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub start_time: u64,
    pub ppid: ProcessId,
    pub name: String,
    pub executable: String,
    pub command: Vec<String>,
    pub user: String,
    pub state: ProcessState,
    /// Percent of a single core, `0.0..=100.0 * num_cpus`.
    pub cpu_percent: f64,
    pub rss_bytes: u64,
    pub vms_bytes: u64,
    pub fd_count: u64,
    pub thread_count: u64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
    /// Nanoseconds since the Unix epoch, monotonically non-decreasing per
    /// identity.
    pub last_updated: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ProcessInfo {
    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity::new(self.pid.0, self.start_time)
    }

    /// Full command line joined with spaces, used for include/exclude
    /// pattern matching against more than just `name`.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// Fields compared to decide whether a cached entry needs an `Updated`
    /// event. `last_updated` is deliberately excluded: a scan that refreshes
    /// the timestamp without any field actually changing should not be
    /// reported as an update.
    pub fn structurally_eq(&self, other: &ProcessInfo) -> bool {
        self.ppid == other.ppid
            && self.name == other.name
            && self.executable == other.executable
            && self.command == other.command
            && self.user == other.user
            && self.state == other.state
            && self.cpu_percent == other.cpu_percent
            && self.rss_bytes == other.rss_bytes
            && self.vms_bytes == other.vms_bytes
            && self.fd_count == other.fd_count
            && self.thread_count == other.thread_count
            && self.io_read_bytes == other.io_read_bytes
            && self.io_write_bytes == other.io_write_bytes
            && self.attributes == other.attributes
    }
}

/// The difference between two `ProcessInfo` snapshots of the same
/// identity. Undefined (never constructed) for mismatched identity or
/// `delta_t <= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessDelta {
    pub delta_cpu_percent: f64,
    pub delta_rss_bytes: i64,
    pub delta_io_read_bytes: i64,
    pub delta_io_write_bytes: i64,
    /// Wall-clock time between the two snapshots, in nanoseconds. Always
    /// positive.
    pub delta_t_nanos: u64,
}

impl ProcessDelta {
    /// Compute the delta between `previous` and `current`, which must
    /// share an identity and have `current.last_updated > previous.last_updated`.
    pub fn between(previous: &ProcessInfo, current: &ProcessInfo) -> Option<ProcessDelta> {
        if previous.identity() != current.identity() {
            return None;
        }
        if current.last_updated <= previous.last_updated {
            return None;
        }
        Some(ProcessDelta {
            delta_cpu_percent: current.cpu_percent - previous.cpu_percent,
            delta_rss_bytes: current.rss_bytes as i64 - previous.rss_bytes as i64,
            delta_io_read_bytes: current.io_read_bytes as i64 - previous.io_read_bytes as i64,
            delta_io_write_bytes: current.io_write_bytes as i64 - previous.io_write_bytes as i64,
            delta_t_nanos: current.last_updated - previous.last_updated,
        })
    }
}

/// A lifecycle event derived from comparing two consecutive scan
/// generations for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProcessEvent {
    Created { info: ProcessInfo, ts_ns: u64 },
    Updated {
        info: ProcessInfo,
        delta: ProcessDelta,
        ts_ns: u64,
    },
    Terminated { info: ProcessInfo, ts_ns: u64 },
}

impl ProcessEvent {
    pub fn identity(&self) -> ProcessIdentity {
        self.info().identity()
    }

    pub fn info(&self) -> &ProcessInfo {
        match self {
            ProcessEvent::Created { info, .. } => info,
            ProcessEvent::Updated { info, .. } => info,
            ProcessEvent::Terminated { info, .. } => info,
        }
    }

    pub fn ts_ns(&self) -> u64 {
        match self {
            ProcessEvent::Created { ts_ns, .. } => *ts_ns,
            ProcessEvent::Updated { ts_ns, .. } => *ts_ns,
            ProcessEvent::Terminated { ts_ns, .. } => *ts_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pid: u32, cpu: f64, ts: u64) -> ProcessInfo {
        ProcessInfo {
            pid: ProcessId(pid),
            start_time: 1,
            ppid: ProcessId(1),
            name: "proc".into(),
            executable: "/usr/bin/proc".into(),
            command: vec!["proc".into()],
            user: "root".into(),
            state: ProcessState::Running,
            cpu_percent: cpu,
            rss_bytes: 1024,
            vms_bytes: 2048,
            fd_count: 4,
            thread_count: 1,
            io_read_bytes: 0,
            io_write_bytes: 0,
            last_updated: ts,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn structural_eq_ignores_last_updated() {
        let a = sample(1, 10.0, 100);
        let b = sample(1, 10.0, 200);
        assert!(a.structurally_eq(&b));
    }

    #[test]
    fn structural_eq_detects_cpu_change() {
        let a = sample(1, 10.0, 100);
        let b = sample(1, 20.0, 200);
        assert!(!a.structurally_eq(&b));
    }

    #[test]
    fn delta_requires_positive_time_step() {
        let a = sample(1, 10.0, 200);
        let b = sample(1, 20.0, 100);
        assert!(ProcessDelta::between(&a, &b).is_none());
    }

    #[test]
    fn delta_computes_field_differences() {
        let a = sample(1, 10.0, 100);
        let b = sample(1, 25.0, 150);
        let d = ProcessDelta::between(&a, &b).unwrap();
        assert_eq!(d.delta_cpu_percent, 15.0);
        assert_eq!(d.delta_t_nanos, 50);
    }
}
