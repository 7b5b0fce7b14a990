//! Tail aggregation: every process that does not make the Top-N is folded
//! into a per-display-name CPU/RSS `DDSketch` pair instead of dropped.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use pp_common::{ProcessInfo, SketchEnvelope, TailAggregateRow};
use pp_sketch::{DDSketch, DDSketchConfig};

use crate::error::Result;

/// The name a tail row is grouped under: the process name itself, falling
/// back to the first argument of its command line for processes reported
/// with an empty name.
pub fn display_name(info: &ProcessInfo) -> String {
    if !info.name.is_empty() {
        return info.name.clone();
    }
    info.command.first().cloned().unwrap_or_else(|| "unknown".to_string())
}

struct TailGroup {
    cpu: DDSketch,
    rss: DDSketch,
    count: u64,
    last_updated: u64,
}

/// Per-display-name CPU/RSS sketches for processes outside the explicit
/// Top-N, with TTL-based eviction for groups that stop being observed.
pub struct TailAggregator {
    sketch_cfg: DDSketchConfig,
    groups: HashMap<String, TailGroup>,
    tail_ttl_ns: u64,
}

impl TailAggregator {
    pub fn new(sketch_cfg: DDSketchConfig, tail_ttl_ns: u64) -> Self {
        Self {
            sketch_cfg,
            groups: HashMap::new(),
            tail_ttl_ns,
        }
    }

    pub fn observe(&mut self, info: &ProcessInfo, ts_ns: u64) -> Result<()> {
        let sketch_cfg = self.sketch_cfg;
        let group = match self.groups.entry(display_name(info)) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let cpu = DDSketch::new(sketch_cfg)?;
                let rss = DDSketch::new(sketch_cfg)?;
                e.insert(TailGroup {
                    cpu,
                    rss,
                    count: 0,
                    last_updated: ts_ns,
                })
            }
        };
        if info.cpu_percent > 0.0 {
            group.cpu.add(info.cpu_percent, 1)?;
        }
        if info.rss_bytes > 0 {
            group.rss.add(info.rss_bytes as f64, 1)?;
        }
        group.count += 1;
        group.last_updated = ts_ns;
        Ok(())
    }

    /// Drop groups that have not been observed within the TTL, so a process
    /// family that disappears does not linger in every future batch.
    pub fn expire(&mut self, now_ns: u64) -> usize {
        let before = self.groups.len();
        self.groups
            .retain(|_, g| now_ns.saturating_sub(g.last_updated) <= self.tail_ttl_ns);
        before - self.groups.len()
    }

    pub fn to_rows(&self) -> Vec<TailAggregateRow> {
        let mut names: Vec<&String> = self.groups.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let g = &self.groups[name];
                TailAggregateRow {
                    display_name: name.clone(),
                    count: g.count,
                    cpu_sketch: envelope_of("cpu", &g.cpu, g.last_updated),
                    rss_sketch: envelope_of("rss", &g.rss, g.last_updated),
                }
            })
            .collect()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

fn envelope_of(metric_name: &str, sketch: &DDSketch, last_updated: u64) -> SketchEnvelope {
    SketchEnvelope {
        metric_name: metric_name.to_string(),
        gamma: sketch.gamma(),
        serialized_sketch: sketch.to_bytes(),
        bucket_count: sketch.bucket_count() as u32,
        last_updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_common::{ProcessId, ProcessState};
    use std::collections::BTreeMap;

    fn cfg() -> DDSketchConfig {
        DDSketchConfig {
            relative_accuracy: 0.0075,
            v_min: 1e-9,
            v_max: 1e9,
            tuning: Default::default(),
        }
    }

    fn proc(pid: u32, name: &str, cpu: f64, rss: u64) -> ProcessInfo {
        ProcessInfo {
            pid: ProcessId(pid),
            start_time: 0,
            ppid: ProcessId(0),
            name: name.to_string(),
            executable: format!("/usr/bin/{name}"),
            command: vec![name.to_string()],
            user: "root".into(),
            state: ProcessState::Running,
            cpu_percent: cpu,
            rss_bytes: rss,
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
    fn groups_by_display_name() {
        let mut tail = TailAggregator::new(cfg(), 1_000_000_000);
        tail.observe(&proc(1, "worker", 10.0, 1000), 100).unwrap();
        tail.observe(&proc(2, "worker", 20.0, 2000), 100).unwrap();
        tail.observe(&proc(3, "other", 5.0, 500), 100).unwrap();
        assert_eq!(tail.group_count(), 2);
        let rows = tail.to_rows();
        let worker = rows.iter().find(|r| r.display_name == "worker").unwrap();
        assert_eq!(worker.count, 2);
    }

    #[test]
    fn expire_drops_stale_groups() {
        let mut tail = TailAggregator::new(cfg(), 100);
        tail.observe(&proc(1, "worker", 10.0, 1000), 100).unwrap();
        let dropped = tail.expire(300);
        assert_eq!(dropped, 1);
        assert_eq!(tail.group_count(), 0);
    }
}
