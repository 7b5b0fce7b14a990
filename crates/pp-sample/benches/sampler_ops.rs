//! Criterion benchmarks for `pp-sample` scoring, Top-N selection, and tail
//! aggregation, using synthetic batches rather than live process data so
//! results are reproducible across machines.

use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pp_common::{NullDiagSink, ProcessId, ProcessInfo, ProcessState};
use pp_config::{SamplerConfig, SketchConfig};
use pp_sample::Sampler;

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

fn bench_observe(c: &mut Criterion) {
    let batch = make_batch(10_000);
    let mut group = c.benchmark_group("sampler_observe");
    group.bench_function("observe_10k_top50", |b| {
        b.iter_batched(
            || Sampler::new(SamplerConfig::default(), SketchConfig::default(), Arc::new(NullDiagSink)),
            |mut sampler| {
                let out = sampler.observe(black_box(&batch), black_box(1_000), "bench-entity").unwrap();
                black_box(out.top.entries.len());
            },
            criterion::BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_observe);
criterion_main!(benches);
