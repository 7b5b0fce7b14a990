//! Benchmarks the force-scan path end to end (scan, diff, score, tail
//! aggregate) over a synthetic in-memory batch, so results are reproducible
//! across machines.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pp_common::{ProcessId, ProcessInfo, ProcessState};
use pp_config::AgentConfig;
use pp_core::Agent;
use pp_scan::source::InMemoryProcessSource;

fn make_batch(n: u32) -> Vec<ProcessInfo> {
    (0..n)
        .map(|i| ProcessInfo {
            pid: ProcessId(i + 1),
            start_time: 1_700_000_000,
            ppid: ProcessId(1),
            name: format!("worker-{}", i % 20),
            executable: "/usr/bin/worker".to_string(),
            command: vec!["worker".to_string()],
            user: "root".to_string(),
            state: ProcessState::Running,
            cpu_percent: (i % 100) as f64,
            rss_bytes: (i as u64 % 4096) * 1024,
            vms_bytes: 0,
            fd_count: 8,
            thread_count: 2,
            io_read_bytes: 0,
            io_write_bytes: 0,
            last_updated: 1_000,
            attributes: BTreeMap::new(),
        })
        .collect()
}

fn bench_force_scan(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let batch = make_batch(5_000);

    let agent = rt.block_on(async {
        let source = Box::new(InMemoryProcessSource::new(std::iter::repeat(batch).take(1_000)));
        Agent::with_process_source(AgentConfig::default(), source).await.unwrap()
    });

    let mut group = c.benchmark_group("agent_force_scan");
    group.bench_function("force_scan_5k_processes", |b| {
        b.iter(|| rt.block_on(async { black_box(agent.force_scan().await.unwrap()) }));
    });
    group.finish();
}

criterion_group!(benches, bench_force_scan);
criterion_main!(benches);
