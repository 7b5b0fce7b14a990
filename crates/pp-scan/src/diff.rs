//! Incremental diffing between a cached generation of `ProcessInfo` and a
//! freshly filtered one.

use std::collections::HashMap;

use pp_common::{ProcessDelta, ProcessEvent, ProcessIdentity, ProcessInfo};

/// Compare `cache` against `fresh` and return the events implied by the
/// difference, plus the new cache to store.
///
/// Per the ordering guarantee, all `Terminated` events for identities
/// present in `cache` but absent from `fresh` are emitted first, then all
/// `Created` events for identities new to `fresh`, then `Updated` events
/// for identities present in both whose fields changed.
pub fn diff(
    cache: &HashMap<ProcessIdentity, ProcessInfo>,
    fresh: Vec<ProcessInfo>,
    ts_ns: u64,
) -> (Vec<ProcessEvent>, HashMap<ProcessIdentity, ProcessInfo>) {
    let fresh_map: HashMap<ProcessIdentity, ProcessInfo> =
        fresh.into_iter().map(|p| (p.identity(), p)).collect();

    let mut events = Vec::new();

    for (identity, info) in cache.iter() {
        if !fresh_map.contains_key(identity) {
            events.push(ProcessEvent::Terminated {
                info: info.clone(),
                ts_ns,
            });
        }
    }

    for (identity, info) in fresh_map.iter() {
        if !cache.contains_key(identity) {
            events.push(ProcessEvent::Created {
                info: info.clone(),
                ts_ns,
            });
        }
    }

    for (identity, fresh_info) in fresh_map.iter() {
        if let Some(cached_info) = cache.get(identity) {
            if !cached_info.structurally_eq(fresh_info) {
                if let Some(delta) = ProcessDelta::between(cached_info, fresh_info) {
                    events.push(ProcessEvent::Updated {
                        info: fresh_info.clone(),
                        delta,
                        ts_ns,
                    });
                }
            }
        }
    }

    (events, fresh_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_common::{ProcessId, ProcessState};
    use std::collections::BTreeMap;

    fn proc(pid: u32, name: &str, cpu: f64, ts: u64) -> ProcessInfo {
        ProcessInfo {
            pid: ProcessId(pid),
            start_time: 1,
            ppid: ProcessId(0),
            name: name.to_string(),
            executable: format!("/usr/bin/{name}"),
            command: vec![name.to_string()],
            user: "root".to_string(),
            state: ProcessState::Running,
            cpu_percent: cpu,
            rss_bytes: 0,
            vms_bytes: 0,
            fd_count: 0,
            thread_count: 0,
            io_read_bytes: 0,
            io_write_bytes: 0,
            last_updated: ts,
            attributes: BTreeMap::new(),
        }
    }

    /// Seeded end-to-end scenario: feed `[{1,"a"},{2,"b"}]` then
    /// `[{1,"a'"},{3,"c"}]`. Per-cycle ordering is Terminated, Created,
    /// Updated (the contract in the concurrency model), so cycle two
    /// emits Terminated(2), Created(3), Updated(1).
    #[test]
    fn scanner_diff_emits_events_in_terminated_created_updated_order() {
        let empty = HashMap::new();
        let (events1, cache1) = diff(&empty, vec![proc(1, "a", 1.0, 100), proc(2, "b", 1.0, 100)], 100);
        assert_eq!(events1.len(), 2);
        assert!(matches!(events1[0], ProcessEvent::Created { .. }));
        assert!(matches!(events1[1], ProcessEvent::Created { .. }));

        let (events2, _cache2) = diff(
            &cache1,
            vec![proc(1, "a", 5.0, 200), proc(3, "c", 1.0, 200)],
            200,
        );
        assert_eq!(events2.len(), 3);
        assert!(matches!(events2[0], ProcessEvent::Terminated { .. }));
        assert_eq!(events2[0].identity().pid, ProcessId(2));
        assert!(matches!(events2[1], ProcessEvent::Created { .. }));
        assert_eq!(events2[1].identity().pid, ProcessId(3));
        assert!(matches!(events2[2], ProcessEvent::Updated { .. }));
        assert_eq!(events2[2].identity().pid, ProcessId(1));
    }

    #[test]
    fn identical_input_twice_produces_zero_events() {
        let p = proc(1, "a", 1.0, 100);
        let empty = HashMap::new();
        let (_e, cache) = diff(&empty, vec![p.clone()], 100);
        let (events, _cache2) = diff(&cache, vec![p], 200);
        assert!(events.is_empty());
    }

    #[test]
    fn created_minus_terminated_equals_cache_size_delta() {
        let empty = HashMap::new();
        let (_e, cache1) = diff(&empty, vec![proc(1, "a", 1.0, 100), proc(2, "b", 1.0, 100)], 100);
        let (events2, cache2) = diff(&cache1, vec![proc(1, "a", 1.0, 200), proc(3, "c", 1.0, 200)], 200);
        let created = events2.iter().filter(|e| matches!(e, ProcessEvent::Created { .. })).count() as i64;
        let terminated = events2.iter().filter(|e| matches!(e, ProcessEvent::Terminated { .. })).count() as i64;
        assert_eq!(created - terminated, cache2.len() as i64 - cache1.len() as i64);
    }
}
