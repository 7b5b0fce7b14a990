//! Top-N Sampler: turns a process batch into a small, bounded envelope.
//!
//! Every tick the sampler scores the batch, keeps the strongest `top_n`
//! processes as explicit rows, and folds everyone else into per-name
//! CPU/RSS sketches so a host running thousands of short-lived processes
//! still produces a bounded, constant-size payload.

pub mod error;
pub mod heap;
pub mod score;
pub mod tail;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pp_common::{
    AgentDiagEvent, BoxFuture, ComponentResourceUsage, Degradable, DiagSink, HealthStatus, Monitorable,
    NullDiagSink, ProcessIdentity, ProcessInfo, Restartable, Severity, TailAggregateRow, TopNBatch, TopNEntry,
};
use pp_config::{SamplerConfig, SketchConfig};
use pp_sketch::DDSketchConfig;

pub use error::{Result, SampleError};
use heap::{Candidate, TopHeap};
use tail::TailAggregator;

/// The output of one `observe()` call: the explicit Top-N batch plus the
/// tail's per-name aggregate rows.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SampleOutput {
    pub top: TopNBatch,
    pub tail: Vec<TailAggregateRow>,
}

/// Counters surfaced by `metrics()`.
#[derive(Debug, Clone, Default)]
pub struct SampleMetrics {
    pub ticks: u64,
    pub scored_count: usize,
    pub dropped_below_min_score: usize,
    pub tail_group_count: usize,
    pub last_capture_ratio: f64,
    pub churn_events: u64,
    pub breaker_trips: u64,
    pub breaker_open: bool,
}

fn sketch_engine_config(cfg: &SketchConfig) -> DDSketchConfig {
    DDSketchConfig {
        relative_accuracy: cfg.relative_accuracy,
        v_min: cfg.min_value,
        v_max: cfg.max_value,
        tuning: pp_sketch::SketchTuning {
            switch_to_dense_above: cfg.switch_threshold,
            switch_to_sparse_below: cfg.switch_threshold / 2.0,
            min_switch_interval: std::time::Duration::from_secs(1),
            collapse_bucket_ceiling: cfg.initial_capacity.max(128) * 8,
            collapse_count_threshold: cfg.collapse_threshold,
            auto_switch: cfg.auto_switch,
        },
    }
}

struct SelfCpuBreaker {
    threshold: f64,
    consecutive_overage: u32,
    trip_after: u32,
    open: bool,
}

impl SelfCpuBreaker {
    fn new(threshold: f64) -> Self {
        Self {
            threshold,
            consecutive_overage: 0,
            trip_after: 3,
            open: false,
        }
    }

    /// Returns `true` if this observation caused a state transition (open
    /// or close), so the caller can decide whether to emit a diagnostic.
    fn observe(&mut self, cpu_percent: f64) -> Option<bool> {
        if self.threshold <= 0.0 {
            return None;
        }
        if cpu_percent > self.threshold {
            self.consecutive_overage += 1;
            if !self.open && self.consecutive_overage >= self.trip_after {
                self.open = true;
                return Some(true);
            }
        } else {
            self.consecutive_overage = 0;
            if self.open {
                self.open = false;
                return Some(false);
            }
        }
        None
    }
}

/// The Top-N Sampler. Not thread-shared directly; an owning task (`pp-core`)
/// calls `observe`/`report_self_cpu` serially from its own tick loop.
pub struct Sampler {
    config: SamplerConfig,
    sketch_cfg: DDSketchConfig,
    diag: Arc<dyn DiagSink>,
    smoothed: HashMap<ProcessIdentity, f64>,
    tail: TailAggregator,
    breaker: SelfCpuBreaker,
    frozen_output: Option<SampleOutput>,
    prev_identities: std::collections::HashSet<ProcessIdentity>,
    prev_tick_ns: Option<u64>,
    metrics: SampleMetrics,
}

impl Sampler {
    pub fn new(config: SamplerConfig, sketch_config: SketchConfig, diag: Arc<dyn DiagSink>) -> Self {
        let sketch_cfg = sketch_engine_config(&sketch_config);
        let tail_ttl_ns = config.tail_ttl.as_nanos() as u64;
        let breaker = SelfCpuBreaker::new(config.max_sampler_cpu);
        Self {
            config,
            sketch_cfg,
            diag,
            smoothed: HashMap::new(),
            tail: TailAggregator::new(sketch_cfg, tail_ttl_ns),
            breaker,
            frozen_output: None,
            prev_identities: std::collections::HashSet::new(),
            prev_tick_ns: None,
            metrics: SampleMetrics::default(),
        }
    }

    pub fn with_null_diag(config: SamplerConfig, sketch_config: SketchConfig) -> Self {
        Self::new(config, sketch_config, Arc::new(NullDiagSink))
    }

    fn diag(&self, severity: Severity, event_type: &str, message: impl Into<String>) {
        self.diag.emit(AgentDiagEvent::new(severity, "sampler", event_type, message));
    }

    pub fn metrics(&self) -> SampleMetrics {
        self.metrics.clone()
    }

    /// The most recently produced output, if any `observe()` call has
    /// completed yet. Used by callers (the agent shell's `once` CLI
    /// subcommand) that want to print the last batch without re-deriving
    /// it from a fresh `observe()` call.
    pub fn last_output(&self) -> Option<SampleOutput> {
        self.frozen_output.clone()
    }

    /// Report the sampler's own measured CPU usage since the last tick.
    /// Call this before `observe()` so a newly-opened breaker can freeze
    /// this tick's output as well as every tick until it recovers.
    pub fn report_self_cpu(&mut self, cpu_percent: f64) {
        match self.breaker.observe(cpu_percent) {
            Some(true) => {
                self.metrics.breaker_trips += 1;
                self.diag(
                    Severity::Warning,
                    "self_cpu_breaker_open",
                    format!("sampler self CPU {cpu_percent:.1}% exceeded {:.1}% for 3 consecutive ticks; freezing output", self.breaker.threshold),
                );
            }
            Some(false) => {
                self.diag(
                    Severity::Info,
                    "self_cpu_breaker_closed",
                    "sampler self CPU back under threshold; resuming full scoring",
                );
            }
            None => {}
        }
        self.metrics.breaker_open = self.breaker.open;
    }

    /// Score, rank, and aggregate one batch. `entity_guid` tags the emitted
    /// `TopNBatch`. When the self-CPU breaker is open this returns the last
    /// good output unchanged rather than doing any scoring work.
    pub fn observe(&mut self, batch: &[ProcessInfo], ts_ns: u64, entity_guid: &str) -> Result<SampleOutput> {
        self.metrics.ticks += 1;

        if self.breaker.open {
            if let Some(frozen) = &self.frozen_output {
                return Ok(frozen.clone());
            }
            // No prior output to freeze on the very first tick; fall through
            // and compute normally rather than returning nothing.
        }

        self.update_churn(batch, ts_ns);

        let rss_peak = score::batch_peaks(batch);
        let mut scored: Vec<Candidate> = Vec::with_capacity(batch.len());
        let mut dropped = 0usize;
        let total_cpu: f64 = batch.iter().map(|p| p.cpu_percent).sum();

        for info in batch {
            let raw = score::raw_score(info, rss_peak, &self.config);
            if raw < self.config.min_score {
                dropped += 1;
                continue;
            }
            let identity = info.identity();
            let smoothed = self.smooth(identity, raw);
            scored.push(Candidate {
                identity,
                score: smoothed,
                info: info.clone(),
            });
        }

        self.metrics.scored_count = scored.len();
        self.metrics.dropped_below_min_score = dropped;

        let bypass_threshold = (self.config.top_n as f64 * 1.25).ceil() as usize;
        let (top, tail_candidates) = if scored.len() <= bypass_threshold {
            scored.sort_by(|a, b| b.cmp(a));
            if scored.len() > self.config.top_n {
                let tail = scored.split_off(self.config.top_n);
                (scored, tail)
            } else {
                (scored, Vec::new())
            }
        } else {
            let mut heap = TopHeap::new(self.config.top_n);
            let mut tail = Vec::with_capacity(scored.len());
            for candidate in scored {
                if let Some(evicted) = heap.offer(candidate) {
                    tail.push(evicted);
                }
            }
            (heap.into_sorted_vec(), tail)
        };

        for candidate in &tail_candidates {
            self.tail.observe(&candidate.info, ts_ns)?;
        }
        self.tail.expire(ts_ns);
        self.metrics.tail_group_count = self.tail.group_count();

        let top_cpu: f64 = top.iter().map(|c| c.info.cpu_percent).sum();
        self.metrics.last_capture_ratio = if total_cpu > 0.0 { top_cpu / total_cpu } else { 1.0 };

        let entries: Vec<TopNEntry> = top.iter().map(|c| to_entry(&c.info)).collect();
        let output = SampleOutput {
            top: TopNBatch::new(entity_guid, ts_ns, entries),
            tail: self.tail.to_rows(),
        };

        self.frozen_output = Some(output.clone());
        self.prev_identities = batch.iter().map(|p| p.identity()).collect();
        Ok(output)
    }

    fn smooth(&mut self, identity: ProcessIdentity, raw: f64) -> f64 {
        let alpha = self.config.stability_factor;
        let entry = self.smoothed.entry(identity).or_insert(raw);
        *entry = alpha * raw + (1.0 - alpha) * *entry;
        *entry
    }

    /// Compute churn rate across the interval since the previous tick and,
    /// if it exceeds the configured threshold, trust the current score more
    /// (shrink effective smoothing) by forgetting stale smoothed history
    /// for processes no longer present. Every process still reports its
    /// own fresh smoothed value the next time it is scored.
    fn update_churn(&mut self, batch: &[ProcessInfo], ts_ns: u64) {
        if !self.config.churn_handling_enabled {
            self.prev_tick_ns = Some(ts_ns);
            return;
        }
        let current: std::collections::HashSet<ProcessIdentity> =
            batch.iter().map(|p| p.identity()).collect();
        let created = current.difference(&self.prev_identities).count();
        let terminated = self.prev_identities.difference(&current).count();

        if let Some(prev_ts) = self.prev_tick_ns {
            let dt_secs = (ts_ns.saturating_sub(prev_ts) as f64 / 1_000_000_000.0).max(1e-6);
            let churn_rate = (created + terminated) as f64 / dt_secs;
            if churn_rate > self.config.churn_threshold {
                self.metrics.churn_events += 1;
                // Drop smoothed history for identities no longer present so
                // the next process to reuse a score slot starts fresh
                // rather than inheriting a stale smoothed value.
                self.smoothed.retain(|id, _| current.contains(id));
                self.diag(
                    Severity::Warning,
                    "churn_high",
                    format!("process churn {churn_rate:.1}/s exceeds threshold {:.1}/s", self.config.churn_threshold),
                );
            }
        }
        self.prev_tick_ns = Some(ts_ns);
    }
}

/// Thread-safe handle around a `Sampler` for Watchdog registration.
///
/// `Sampler` itself is owned and driven serially (`&mut self`) by the
/// agent's own sample tick loop; the capability traits need a shared,
/// `Send + Sync` handle instead, so this wraps the sampler in a mutex and
/// tracks the two pieces of state an external caller reports rather than
/// measures itself: the sampler's own process CPU usage (`report_self_cpu`
/// comes from outside, same as `Scanner`'s `self_usage`) and the
/// degradation-driven tick interval multiplier.
pub struct SharedSampler {
    inner: Arc<Mutex<Sampler>>,
    last_self_cpu_percent: AtomicU64,
    degradation_level: AtomicU8,
}

impl SharedSampler {
    pub fn new(sampler: Sampler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sampler)),
            last_self_cpu_percent: AtomicU64::new(0),
            degradation_level: AtomicU8::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sampler> {
        self.inner.lock().expect("sampler mutex poisoned")
    }

    pub fn observe(&self, batch: &[ProcessInfo], ts_ns: u64, entity_guid: &str) -> Result<SampleOutput> {
        self.lock().observe(batch, ts_ns, entity_guid)
    }

    pub fn report_self_cpu(&self, cpu_percent: f64) {
        self.last_self_cpu_percent.store(cpu_percent.to_bits(), Ordering::SeqCst);
        self.lock().report_self_cpu(cpu_percent);
    }

    pub fn metrics(&self) -> SampleMetrics {
        self.lock().metrics()
    }

    pub fn last_output(&self) -> Option<SampleOutput> {
        self.lock().last_output()
    }

    /// The tick interval the sample loop should use this cycle: `baseline`
    /// scaled up by one unit per degradation level, mirroring the scanner's
    /// `reduce_scan_frequency` degradation action.
    pub fn effective_interval(&self, baseline: Duration) -> Duration {
        let level = self.degradation_level.load(Ordering::SeqCst);
        baseline.mul_f64(1.0 + level as f64)
    }
}

impl Monitorable for SharedSampler {
    fn resource_usage(&self) -> ComponentResourceUsage {
        let metrics = self.lock().metrics();
        ComponentResourceUsage {
            cpu_percent: f64::from_bits(self.last_self_cpu_percent.load(Ordering::SeqCst)),
            memory_mb: 0,
            file_descriptors: 0,
            tasks: if metrics.ticks > 0 { 1 } else { 0 },
        }
    }

    fn health(&self) -> HealthStatus {
        let metrics = self.lock().metrics();
        if metrics.breaker_open {
            HealthStatus::Degraded("self-CPU breaker open, output frozen".into())
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Restartable for SharedSampler {
    /// The sampler holds no external resources to release; "shutdown"
    /// clears its smoothing/tail/churn history so the following `start`
    /// begins from a clean slate, same effect as recreating the struct.
    fn shutdown(&self, _deadline: Duration) -> BoxFuture<'_, std::result::Result<(), String>> {
        Box::pin(async move {
            let mut sampler = self.lock();
            sampler.smoothed.clear();
            sampler.tail = TailAggregator::new(sampler.sketch_cfg, sampler.config.tail_ttl.as_nanos() as u64);
            sampler.frozen_output = None;
            sampler.prev_identities.clear();
            sampler.prev_tick_ns = None;
            Ok(())
        })
    }

    fn start(&self) -> BoxFuture<'_, std::result::Result<(), String>> {
        Box::pin(async move { Ok(()) })
    }

    fn is_running(&self) -> bool {
        true
    }
}

impl Degradable for SharedSampler {
    fn set_degradation_level(&self, level: u8) -> std::result::Result<(), String> {
        self.degradation_level.store(level, Ordering::SeqCst);
        Ok(())
    }

    fn get_degradation_level(&self) -> u8 {
        self.degradation_level.load(Ordering::SeqCst)
    }
}

fn to_entry(info: &ProcessInfo) -> TopNEntry {
    TopNEntry {
        pid: info.pid,
        ppid: info.ppid,
        name: info.name.clone(),
        command: info.command.clone(),
        user: info.user.clone(),
        cpu_percent: info.cpu_percent,
        rss_bytes: info.rss_bytes,
        vms_bytes: info.vms_bytes,
        fd_count: info.fd_count,
        thread_count: info.thread_count,
        state: info.state,
        start_time: info.start_time,
        io_read_bytes: info.io_read_bytes,
        io_write_bytes: info.io_write_bytes,
        labels: info
            .attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pp_common::{CollectingDiagSink, ProcessId, ProcessState};
    use std::collections::BTreeMap;

    fn proc(pid: u32, cpu: f64, ts: u64) -> ProcessInfo {
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
            last_updated: ts,
            attributes: BTreeMap::new(),
        }
    }

    fn sampler(top_n: usize) -> Sampler {
        let cfg = SamplerConfig {
            top_n,
            cpu_weight: 1.0,
            rss_weight: 0.0,
            min_score: 0.0,
            stability_factor: 1.0,
            ..SamplerConfig::default()
        };
        Sampler::with_null_diag(cfg, SketchConfig::default())
    }

    #[test]
    fn seeded_scenario_top3_of_five() {
        let mut s = sampler(3);
        let batch: Vec<ProcessInfo> = [10.0, 20.0, 30.0, 40.0, 50.0]
            .iter()
            .enumerate()
            .map(|(i, &cpu)| proc(i as u32 + 1, cpu, 100))
            .collect();
        let out = s.observe(&batch, 100, "guid-1").unwrap();
        assert_eq!(out.top.entries.len(), 3);
        let mut cpus: Vec<f64> = out.top.entries.iter().map(|e| e.cpu_percent).collect();
        cpus.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(cpus, vec![50.0, 40.0, 30.0]);
        assert_eq!(s.metrics().tail_group_count, 2);
        // top cpu 50+40+30=120 of total 150 => 0.8.
        assert!((s.metrics().last_capture_ratio - 0.8).abs() < 1e-9);
    }

    #[test]
    fn scores_below_min_score_are_dropped_entirely() {
        let mut cfg_sampler = sampler(5);
        cfg_sampler.config.min_score = 50.0;
        let batch = vec![proc(1, 10.0, 100), proc(2, 90.0, 100)];
        let out = cfg_sampler.observe(&batch, 100, "guid").unwrap();
        assert_eq!(out.top.entries.len(), 1);
        assert_eq!(cfg_sampler.metrics().dropped_below_min_score, 1);
        assert_eq!(cfg_sampler.metrics().tail_group_count, 0);
    }

    #[test]
    fn heap_bypass_and_heap_path_agree_on_small_batches() {
        let mut s = sampler(2);
        let batch = vec![proc(1, 10.0, 100), proc(2, 20.0, 100), proc(3, 5.0, 100)];
        let out = s.observe(&batch, 100, "guid").unwrap();
        let pids: Vec<u32> = out.top.entries.iter().map(|e| e.pid.0).collect();
        assert_eq!(pids, vec![2, 1]);
    }

    #[test]
    fn self_cpu_breaker_freezes_output_after_three_overages() {
        let mut s = sampler(2);
        let batch = vec![proc(1, 50.0, 100), proc(2, 10.0, 100)];
        let first = s.observe(&batch, 100, "guid").unwrap();

        s.breaker.threshold = 1.0;
        s.report_self_cpu(5.0);
        s.report_self_cpu(5.0);
        s.report_self_cpu(5.0);
        assert!(s.metrics().breaker_open);

        let changed_batch = vec![proc(3, 99.0, 200)];
        let frozen = s.observe(&changed_batch, 200, "guid").unwrap();
        assert_eq!(frozen.top.entries.len(), first.top.entries.len());
        assert_eq!(frozen.top.entries[0].pid, first.top.entries[0].pid);
    }

    #[test]
    fn churn_storm_emits_diagnostic_and_resets_smoothing_history() {
        let cfg = SamplerConfig {
            top_n: 5,
            cpu_weight: 1.0,
            rss_weight: 0.0,
            min_score: 0.0,
            stability_factor: 0.3,
            churn_handling_enabled: true,
            churn_threshold: 1.0,
            ..SamplerConfig::default()
        };
        let diag = Arc::new(CollectingDiagSink::new());
        let mut s = Sampler::new(cfg, SketchConfig::default(), diag.clone());

        let batch1 = vec![proc(1, 10.0, 100)];
        s.observe(&batch1, 1_000_000_000, "guid").unwrap();

        // Every pid churns over in the next tick, 1 second later: churn
        // rate = 2/s (1 created + 1 terminated), above the 1/s threshold.
        let batch2 = vec![proc(2, 10.0, 200)];
        s.observe(&batch2, 2_000_000_000, "guid").unwrap();

        assert!(s.metrics().churn_events >= 1);
        assert!(diag.events().iter().any(|e| e.event_type == "churn_high"));
    }

    #[test]
    fn shared_sampler_reports_last_self_cpu_and_health() {
        let shared = SharedSampler::new(sampler(3));
        assert!(shared.health().is_healthy());
        shared.report_self_cpu(12.5);
        assert_eq!(shared.resource_usage().cpu_percent, 12.5);

        let batch = vec![proc(1, 50.0, 100), proc(2, 10.0, 100)];
        shared.observe(&batch, 100, "guid").unwrap();
        shared.lock().breaker.threshold = 1.0;
        shared.report_self_cpu(5.0);
        shared.report_self_cpu(5.0);
        shared.report_self_cpu(5.0);
        assert!(!shared.health().is_healthy());
    }

    #[test]
    fn shared_sampler_degradation_widens_effective_interval() {
        let shared = SharedSampler::new(sampler(3));
        let baseline = Duration::from_secs(1);
        assert_eq!(shared.effective_interval(baseline), baseline);
        shared.set_degradation_level(2).unwrap();
        assert_eq!(shared.get_degradation_level(), 2);
        assert_eq!(shared.effective_interval(baseline), baseline.mul_f64(3.0));
    }

    #[test]
    fn shared_sampler_shutdown_clears_history_then_restarts() {
        let shared = SharedSampler::new(sampler(3));
        let batch = vec![proc(1, 10.0, 100)];
        shared.observe(&batch, 100, "guid").unwrap();
        assert!(shared.lock().frozen_output.is_some());

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            Restartable::shutdown(&shared, Duration::from_secs(1)).await.unwrap();
        });
        assert!(shared.lock().frozen_output.is_none());
        assert!(shared.is_running());
    }
}
