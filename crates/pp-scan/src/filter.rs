//! Include/exclude pattern filtering.
//!
//! Patterns are compiled once, at construction, so a malformed pattern is
//! a `ScanError::PatternCompileError` at load time and never surfaces
//! mid-scan.

use pp_common::ProcessInfo;
use regex::RegexSet;

use crate::error::Result;

pub struct Filter {
    include: RegexSet,
    exclude: RegexSet,
    has_include: bool,
    has_exclude: bool,
}

impl Filter {
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            include: RegexSet::new(include_patterns)?,
            exclude: RegexSet::new(exclude_patterns)?,
            has_include: !include_patterns.is_empty(),
            has_exclude: !exclude_patterns.is_empty(),
        })
    }

    pub fn passthrough() -> Self {
        Self {
            include: RegexSet::empty(),
            exclude: RegexSet::empty(),
            has_include: false,
            has_exclude: false,
        }
    }

    /// Exclude patterns are evaluated first, against both `name` and the
    /// full command line; exclude wins over include when both match. An
    /// empty include set passes everything not excluded.
    pub fn matches(&self, process: &ProcessInfo) -> bool {
        if self.has_exclude {
            let cmd = process.command_line();
            if self.exclude.is_match(&process.name) || self.exclude.is_match(&cmd) {
                return false;
            }
        }
        if !self.has_include {
            return true;
        }
        let cmd = process.command_line();
        self.include.is_match(&process.name) || self.include.is_match(&cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_common::{ProcessId, ProcessState};
    use std::collections::BTreeMap;

    fn proc(name: &str, cmd: &str) -> ProcessInfo {
        ProcessInfo {
            pid: ProcessId(1),
            start_time: 0,
            ppid: ProcessId(0),
            name: name.to_string(),
            executable: format!("/usr/bin/{name}"),
            command: cmd.split(' ').map(str::to_string).collect(),
            user: "root".to_string(),
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
    fn empty_filters_pass_everything() {
        let f = Filter::passthrough();
        assert!(f.matches(&proc("anything", "anything --flag")));
    }

    #[test]
    fn exclude_wins_over_include() {
        let f = Filter::new(&["^nginx$".to_string()], &["^nginx$".to_string()]).unwrap();
        assert!(!f.matches(&proc("nginx", "nginx -g daemon")));
    }

    #[test]
    fn include_requires_a_match() {
        let f = Filter::new(&["^sshd$".to_string()], &[]).unwrap();
        assert!(f.matches(&proc("sshd", "sshd -D")));
        assert!(!f.matches(&proc("bash", "bash")));
    }

    #[test]
    fn exclude_matches_against_full_command_line() {
        let f = Filter::new(&[], &["--debug-mode".to_string()]).unwrap();
        assert!(!f.matches(&proc("worker", "worker --debug-mode")));
    }
}
