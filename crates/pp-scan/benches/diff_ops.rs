//! Criterion benchmarks for `pp-scan` incremental diffing.
//!
//! These benchmarks avoid real process enumeration so they run
//! deterministically in CI and on developer machines.

use std::collections::{BTreeMap, HashMap};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pp_common::{ProcessId, ProcessInfo, ProcessState};
use pp_scan::diff::diff;

fn make_process(pid: u32, cpu_percent: f64, last_updated: u64) -> ProcessInfo {
    ProcessInfo {
        pid: ProcessId(pid),
        start_time: 1_700_000_000,
        ppid: ProcessId(1),
        name: "proc".to_string(),
        executable: "/usr/bin/proc".to_string(),
        command: vec!["proc".to_string(), "--synthetic".to_string()],
        user: "root".to_string(),
        state: ProcessState::Running,
        cpu_percent,
        rss_bytes: 1024 * 1024,
        vms_bytes: 4096 * 1024,
        fd_count: 12,
        thread_count: 4,
        io_read_bytes: 0,
        io_write_bytes: 0,
        last_updated,
        attributes: BTreeMap::new(),
    }
}

fn bench_diff(c: &mut Criterion) {
    // Baseline: 10k processes.
    let mut baseline = Vec::with_capacity(10_000);
    for i in 0..10_000u32 {
        baseline.push(make_process(i + 1000, (i % 80) as f64, 100));
    }
    let cache: HashMap<_, _> = baseline.iter().map(|p| (p.identity(), p.clone())).collect();

    // Current: drop the first 500, keep the rest with drifted CPU on every
    // 10th survivor, add 500 new.
    let mut current = Vec::with_capacity(10_000);
    for i in 500..10_000u32 {
        let mut cpu = (i % 80) as f64;
        if i % 10 == 0 {
            cpu += 10.0;
        }
        current.push(make_process(i + 1000, cpu, 200));
    }
    for i in 10_000..10_500u32 {
        current.push(make_process(i + 1000, 5.0, 200));
    }

    let mut group = c.benchmark_group("scan_diff");
    group.bench_function("diff_10k", |b| {
        b.iter(|| {
            let (events, _cache) = diff(black_box(&cache), black_box(current.clone()), black_box(200));
            black_box(events.len());
        })
    });
    group.finish();
}

criterion_group!(benches, bench_diff);
criterion_main!(benches);
