//! An in-memory `ProcessSource` that replays a caller-supplied sequence of
//! snapshots, one per `scan()` call. Used by unit tests and the seeded
//! end-to-end scenarios; the last snapshot repeats once the sequence is
//! exhausted so a test driving more ticks than it queued still observes a
//! stable state rather than an empty one.

use std::collections::VecDeque;

use pp_common::ProcessInfo;

use super::{ProcessSource, ResourceUsage};
use crate::error::Result;

pub struct InMemoryProcessSource {
    snapshots: VecDeque<Vec<ProcessInfo>>,
    last: Vec<ProcessInfo>,
    self_usage: ResourceUsage,
}

impl InMemoryProcessSource {
    pub fn new(snapshots: impl IntoIterator<Item = Vec<ProcessInfo>>) -> Self {
        Self {
            snapshots: snapshots.into_iter().collect(),
            last: Vec::new(),
            self_usage: ResourceUsage::default(),
        }
    }

    /// Override the resource usage returned by `self_usage()`, used to
    /// exercise the scanner's adaptive-interval path deterministically.
    pub fn with_self_usage(mut self, usage: ResourceUsage) -> Self {
        self.self_usage = usage;
        self
    }

    pub fn set_self_usage(&mut self, usage: ResourceUsage) {
        self.self_usage = usage;
    }
}

impl ProcessSource for InMemoryProcessSource {
    fn scan(&mut self) -> Result<Vec<ProcessInfo>> {
        if let Some(next) = self.snapshots.pop_front() {
            self.last = next;
        }
        Ok(self.last.clone())
    }

    fn self_usage(&mut self) -> Result<ResourceUsage> {
        Ok(self.self_usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_common::{ProcessId, ProcessState};
    use std::collections::BTreeMap;

    fn proc(pid: u32) -> ProcessInfo {
        ProcessInfo {
            pid: ProcessId(pid),
            start_time: 1,
            ppid: ProcessId(0),
            name: "x".into(),
            executable: "/bin/x".into(),
            command: vec!["x".into()],
            user: "root".into(),
            state: ProcessState::Running,
            cpu_percent: 0.0,
            rss_bytes: 0,
            vms_bytes: 0,
            fd_count: 0,
            thread_count: 0,
            io_read_bytes: 0,
            io_write_bytes: 0,
            last_updated: 0,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn replays_each_snapshot_then_holds_the_last() {
        let mut src = InMemoryProcessSource::new([vec![proc(1)], vec![proc(1), proc(2)]]);
        assert_eq!(src.scan().unwrap().len(), 1);
        assert_eq!(src.scan().unwrap().len(), 2);
        assert_eq!(src.scan().unwrap().len(), 2);
    }
}
