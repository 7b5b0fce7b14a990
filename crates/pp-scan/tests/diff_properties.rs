//! Property test for the scanner's diff invariant: for any sequence of
//! random process-id snapshots, created minus terminated events in a cycle
//! equals the signed delta of cache size across that cycle.

use std::collections::{BTreeMap, HashMap};

use pp_common::{ProcessEvent, ProcessId, ProcessIdentity, ProcessInfo, ProcessState};
use pp_scan::diff::diff;
use proptest::prelude::*;

fn proc(pid: u32, cpu: f64) -> ProcessInfo {
    ProcessInfo {
        pid: ProcessId(pid),
        start_time: 1,
        ppid: ProcessId(0),
        name: format!("p{pid}"),
        executable: "/bin/p".into(),
        command: vec![format!("p{pid}")],
        user: "root".into(),
        state: ProcessState::Running,
        cpu_percent: cpu,
        rss_bytes: 0,
        vms_bytes: 0,
        fd_count: 0,
        thread_count: 0,
        io_read_bytes: 0,
        io_write_bytes: 0,
        last_updated: 100,
        attributes: BTreeMap::new(),
    }
}

proptest! {
    #[test]
    fn created_minus_terminated_tracks_cache_size_delta_across_random_cycles(
        pid_snapshots in prop::collection::vec(
            prop::collection::hash_set(1u32..40, 0..25),
            1..12,
        ),
    ) {
        let mut cache: HashMap<ProcessIdentity, ProcessInfo> = HashMap::new();
        let mut ts = 0u64;
        for pids in pid_snapshots {
            ts += 1;
            let fresh: Vec<ProcessInfo> = pids.iter().map(|&pid| proc(pid, (pid % 7) as f64)).collect();
            let cache_len_before = cache.len() as i64;
            let (events, new_cache) = diff(&cache, fresh, ts);
            let created = events.iter().filter(|e| matches!(e, ProcessEvent::Created { .. })).count() as i64;
            let terminated = events.iter().filter(|e| matches!(e, ProcessEvent::Terminated { .. })).count() as i64;
            let cache_len_after = new_cache.len() as i64;
            prop_assert_eq!(created - terminated, cache_len_after - cache_len_before);
            cache = new_cache;
        }
    }
}
