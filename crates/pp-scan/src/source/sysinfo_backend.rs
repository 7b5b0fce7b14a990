//! The production `ProcessSource`, backed by the `sysinfo` crate.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use pp_common::{ProcessId, ProcessInfo, ProcessState};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

use super::{ProcessSource, ResourceUsage};
use crate::error::Result;

pub struct SysinfoProcessSource {
    system: System,
    self_pid: Pid,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        let system = System::new_all();
        let self_pid = sysinfo::get_current_pid().unwrap_or(Pid::from_u32(0));
        Self { system, self_pid }
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

fn map_status(status: ProcessStatus) -> ProcessState {
    match status {
        ProcessStatus::Run => ProcessState::Running,
        ProcessStatus::Sleep => ProcessState::Sleeping,
        ProcessStatus::Waiting | ProcessStatus::Idle => ProcessState::Waiting,
        ProcessStatus::Stop => ProcessState::Stopped,
        ProcessStatus::Zombie => ProcessState::Zombie,
        _ => ProcessState::Unknown,
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

impl ProcessSource for SysinfoProcessSource {
    fn scan(&mut self) -> Result<Vec<ProcessInfo>> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        let ts_ns = now_ns();
        let mut out = Vec::with_capacity(self.system.processes().len());
        for (pid, process) in self.system.processes() {
            let disk = process.disk_usage();
            out.push(ProcessInfo {
                pid: ProcessId(pid.as_u32()),
                start_time: process.start_time(),
                ppid: process
                    .parent()
                    .map(|p| ProcessId(p.as_u32()))
                    .unwrap_or(ProcessId(0)),
                name: process.name().to_string_lossy().to_string(),
                executable: process
                    .exe()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                command: process
                    .cmd()
                    .iter()
                    .map(|a| a.to_string_lossy().to_string())
                    .collect(),
                user: process
                    .user_id()
                    .map(|uid| uid.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                state: map_status(process.status()),
                cpu_percent: process.cpu_usage() as f64,
                rss_bytes: process.memory(),
                vms_bytes: process.virtual_memory(),
                fd_count: 0, // not exposed cross-platform by sysinfo
                thread_count: process.tasks().map(|t| t.len() as u64).unwrap_or(0),
                io_read_bytes: disk.total_read_bytes,
                io_write_bytes: disk.total_written_bytes,
                last_updated: ts_ns,
                attributes: BTreeMap::new(),
            });
        }
        Ok(out)
    }

    fn self_usage(&mut self) -> Result<ResourceUsage> {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[self.self_pid]), true, ProcessRefreshKind::everything());
        let usage = self
            .system
            .process(self.self_pid)
            .map(|p| ResourceUsage {
                cpu_percent: p.cpu_usage() as f64,
                memory_bytes: p.memory(),
            })
            .unwrap_or_default();
        Ok(usage)
    }
}
