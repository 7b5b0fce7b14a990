//! Process Scanner: periodic enumeration, filtering, incremental diffing,
//! event emission, and adaptive rate control.
//!
//! The scanner owns exactly one resource exclusively: the pid -> cached
//! `ProcessInfo` map. Every tick it pulls a fresh snapshot from a
//! `ProcessSource`, filters it, diffs it against the cache, and fans the
//! resulting `ProcessEvent`s out to registered consumers over a bounded
//! channel. `adjust_interval` lets the scanner back off its own polling
//! rate when its self-measured CPU usage runs hot, so observing the host
//! never becomes a load the host has to carry.

pub mod diff;
pub mod error;
pub mod filter;
pub mod source;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pp_common::{
    AgentDiagEvent, BoxFuture, ComponentResourceUsage, Degradable, DiagSink, HealthStatus, Monitorable,
    NullDiagSink, ProcessEvent, ProcessIdentity, ProcessInfo, Restartable, Severity,
};
use pp_config::ScannerConfig;

pub use error::{Result, ScanError};
pub use filter::Filter;
pub use source::{ProcessSource, ResourceUsage};

/// The scanner's lifecycle state, per the contract's status FSM:
/// `Initialized -> Running (start) -> Stopped (stop) -> Running (start) ->
/// Stopped (shutdown)`, with `Running -> Error` on an unrecoverable fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerStatus {
    Initialized,
    Running,
    Paused,
    Stopped,
    Error,
}

/// Capability a registered consumer exposes to receive lifecycle events.
/// Kept synchronous (not an async trait) so it is trivially object-safe;
/// a consumer that needs to do async work enqueues onto its own channel
/// from inside `handle` rather than awaiting here.
pub trait ProcessEventHandler: Send + Sync {
    fn handle(&self, event: &ProcessEvent) -> std::result::Result<(), String>;
}

/// Counters surfaced by `metrics()`. Monotonically increasing for the
/// lifetime of the scanner; `process_count` is the one gauge (current, not
/// cumulative).
#[derive(Debug, Clone, Default)]
pub struct ScannerMetrics {
    pub scan_errors: u64,
    pub notification_errors: u64,
    pub created_total: u64,
    pub updated_total: u64,
    pub terminated_total: u64,
    pub process_count: usize,
    pub adaptive_rate_changes: u64,
}

impl ScannerMetrics {
    /// Render as a string-keyed map, matching the contract's `metrics() ->
    /// map` shape for callers that want a generic view (e.g. the `status`
    /// CLI subcommand's JSON output) rather than the typed struct.
    pub fn as_map(&self) -> HashMap<String, u64> {
        HashMap::from([
            ("scan_errors".to_string(), self.scan_errors),
            ("notification_errors".to_string(), self.notification_errors),
            ("created_total".to_string(), self.created_total),
            ("updated_total".to_string(), self.updated_total),
            ("terminated_total".to_string(), self.terminated_total),
            ("process_count".to_string(), self.process_count as u64),
            ("adaptive_rate_changes".to_string(), self.adaptive_rate_changes),
        ])
    }
}

/// The outcome of a single scan cycle, returned by `force_scan` and used
/// internally to drive metrics/diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub events: Vec<ProcessEvent>,
}

struct Inner {
    config: ScannerConfig,
    filter: Filter,
    source: Mutex<Box<dyn ProcessSource>>,
    cache: Mutex<HashMap<ProcessIdentity, ProcessInfo>>,
    consumers: RwLock<HashMap<String, Arc<dyn ProcessEventHandler>>>,
    status: Mutex<ScannerStatus>,
    metrics: Mutex<ScannerMetrics>,
    diag: Arc<dyn DiagSink>,
    event_tx: Mutex<mpsc::Sender<ProcessEvent>>,
    event_rx: Mutex<Option<mpsc::Receiver<ProcessEvent>>>,
    current_interval: Mutex<Duration>,
    last_interval_change: Mutex<Option<Instant>>,
    cancel: Mutex<CancellationToken>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    pump_task: Mutex<Option<JoinHandle<mpsc::Receiver<ProcessEvent>>>>,
    degradation_level: AtomicU8,
    tick_count: std::sync::atomic::AtomicU64,
}

/// The Process Scanner. Cheaply cloneable (every field lives behind an
/// `Arc`), so a handle can be shared with the agent shell's CLI `once`
/// subcommand and the Watchdog's `Monitorable` registration alike.
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<Inner>,
}

impl Scanner {
    /// Construct (and validate-configure) a scanner over `source`. This is
    /// the Rust-idiomatic fold of the contract's `init(config)` step into
    /// construction: a `Scanner` is never observed half-initialized.
    pub fn new(
        config: ScannerConfig,
        source: Box<dyn ProcessSource>,
        diag: Arc<dyn DiagSink>,
    ) -> Result<Self> {
        let filter = Filter::new(&config.include_patterns, &config.exclude_patterns)?;
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_size);
        let baseline = config.scan_interval;
        let inner = Inner {
            config,
            filter,
            source: Mutex::new(source),
            cache: Mutex::new(HashMap::new()),
            consumers: RwLock::new(HashMap::new()),
            status: Mutex::new(ScannerStatus::Initialized),
            metrics: Mutex::new(ScannerMetrics::default()),
            diag,
            event_tx: Mutex::new(event_tx),
            event_rx: Mutex::new(Some(event_rx)),
            current_interval: Mutex::new(baseline),
            last_interval_change: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            tick_task: Mutex::new(None),
            pump_task: Mutex::new(None),
            degradation_level: AtomicU8::new(0),
            tick_count: std::sync::atomic::AtomicU64::new(0),
        };
        Ok(Self { inner: Arc::new(inner) })
    }

    /// Construct with a no-op diagnostic sink, for tests that do not care
    /// about the diagnostics a scan emits.
    pub fn with_null_diag(config: ScannerConfig, source: Box<dyn ProcessSource>) -> Result<Self> {
        Self::new(config, source, Arc::new(NullDiagSink))
    }

    fn diag(&self, severity: Severity, event_type: &str, message: impl Into<String>) {
        self.inner
            .diag
            .emit(AgentDiagEvent::new(severity, "scanner", event_type, message));
    }

    pub fn status(&self) -> ScannerStatus {
        *self.inner.status.lock().expect("status mutex poisoned")
    }

    fn set_status(&self, status: ScannerStatus) {
        *self.inner.status.lock().expect("status mutex poisoned") = status;
    }

    pub fn metrics(&self) -> ScannerMetrics {
        self.inner.metrics.lock().expect("metrics mutex poisoned").clone()
    }

    pub fn cached(&self) -> Vec<ProcessInfo> {
        self.inner
            .cache
            .lock()
            .expect("cache mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn resources(&self) -> Result<ResourceUsage> {
        self.inner.source.lock().expect("source mutex poisoned").self_usage()
    }

    /// Count of completed scan cycles, regardless of outcome. The agent
    /// shell's heartbeat supervisor watches this for forward progress since
    /// the scanner's own tick loop has no direct handle to the Watchdog.
    pub fn tick_count(&self) -> u64 {
        self.inner.tick_count.load(Ordering::SeqCst)
    }

    pub async fn register_consumer(&self, name: impl Into<String>, handler: Arc<dyn ProcessEventHandler>) {
        self.inner.consumers.write().await.insert(name.into(), handler);
    }

    pub async fn unregister_consumer(&self, name: &str) {
        self.inner.consumers.write().await.remove(name);
    }

    /// Start the periodic tick loop and the event-fan-out pump. Valid only
    /// from `Initialized`, `Stopped`, or `Paused`; a start while already
    /// `Running` is a contract violation, not a transient condition.
    pub fn start(&self) -> Result<()> {
        let status = self.status();
        if status == ScannerStatus::Running {
            return Err(ScanError::InvalidState(format!(
                "cannot start scanner from status {status:?}"
            )));
        }

        let rx = self
            .inner
            .event_rx
            .lock()
            .expect("event_rx mutex poisoned")
            .take()
            .ok_or_else(|| {
                ScanError::InvalidState("scanner has been shut down and cannot be restarted".into())
            })?;

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().expect("cancel mutex poisoned") = cancel.clone();

        let pump = self.clone();
        let pump_cancel = cancel.clone();
        let pump_handle = tokio::spawn(async move { pump.run_pump(rx, pump_cancel).await });
        *self.inner.pump_task.lock().expect("pump_task mutex poisoned") = Some(pump_handle);

        let ticker = self.clone();
        let tick_cancel = cancel;
        let tick_handle = tokio::spawn(async move { ticker.run_ticks(tick_cancel).await });
        *self.inner.tick_task.lock().expect("tick_task mutex poisoned") = Some(tick_handle);

        self.set_status(ScannerStatus::Running);
        Ok(())
    }

    async fn run_ticks(&self, cancel: CancellationToken) {
        loop {
            let interval = *self.inner.current_interval.lock().expect("interval mutex poisoned");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Drains `rx` until cancelled, then hands it back so a subsequent
    /// `start()` can resume on the same channel rather than needing a
    /// fresh one (and its own consumer-visible discontinuity).
    async fn run_pump(&self, mut rx: mpsc::Receiver<ProcessEvent>, cancel: CancellationToken) -> mpsc::Receiver<ProcessEvent> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => {
                    match event {
                        Some(event) => self.fan_out(&event).await,
                        None => break,
                    }
                }
            }
        }
        rx
    }

    async fn fan_out(&self, event: &ProcessEvent) {
        // Snapshot the registry under a read lock, then release it before
        // calling into consumer code: per-handler errors must never block
        // registration changes from another task.
        let handlers: Vec<Arc<dyn ProcessEventHandler>> =
            self.inner.consumers.read().await.values().cloned().collect();
        for handler in handlers {
            if let Err(err) = handler.handle(event) {
                let mut metrics = self.inner.metrics.lock().expect("metrics mutex poisoned");
                metrics.notification_errors += 1;
                drop(metrics);
                self.diag(
                    Severity::Warning,
                    "handler_error",
                    format!("consumer handler failed: {err}"),
                );
            }
        }
    }

    /// Run exactly one scan cycle out of band, independent of the ticking
    /// task. Used by the CLI's `once` subcommand and by tests.
    pub async fn force_scan(&self) -> ScanOutcome {
        self.run_cycle().await
    }

    /// The full per-tick algorithm from the contract: enumerate, filter,
    /// diff, enqueue, update counters, maybe adjust interval.
    async fn run_cycle(&self) -> ScanOutcome {
        self.inner.tick_count.fetch_add(1, Ordering::SeqCst);
        let fresh = {
            let mut source = self.inner.source.lock().expect("source mutex poisoned");
            source.scan()
        };
        let fresh = match fresh {
            Ok(procs) => procs,
            Err(err) => {
                let mut metrics = self.inner.metrics.lock().expect("metrics mutex poisoned");
                metrics.scan_errors += 1;
                drop(metrics);
                self.diag(
                    Severity::Warning,
                    "scan_error",
                    format!("process enumeration failed: {err}"),
                );
                return ScanOutcome::default();
            }
        };

        let filtered: Vec<ProcessInfo> = fresh
            .into_iter()
            .filter(|p| self.inner.filter.matches(p))
            .collect();
        let filtered = if self.inner.config.max_processes > 0 {
            let mut filtered = filtered;
            filtered.truncate(self.inner.config.max_processes);
            filtered
        } else {
            filtered
        };

        let ts_ns = now_ns();
        let (events, new_cache) = {
            let cache = self.inner.cache.lock().expect("cache mutex poisoned");
            diff::diff(&cache, filtered, ts_ns)
        };
        *self.inner.cache.lock().expect("cache mutex poisoned") = new_cache;

        {
            let mut metrics = self.inner.metrics.lock().expect("metrics mutex poisoned");
            for event in &events {
                match event {
                    ProcessEvent::Created { .. } => metrics.created_total += 1,
                    ProcessEvent::Updated { .. } => metrics.updated_total += 1,
                    ProcessEvent::Terminated { .. } => metrics.terminated_total += 1,
                }
            }
            metrics.process_count = self.inner.cache.lock().expect("cache mutex poisoned").len();
        }

        for event in &events {
            let wait = Duration::from_millis(100);
            let tx = self.inner.event_tx.lock().expect("event_tx mutex poisoned").clone();
            match tokio::time::timeout(wait, tx.send(event.clone())).await {
                Ok(Ok(())) => {}
                _ => {
                    let mut metrics = self.inner.metrics.lock().expect("metrics mutex poisoned");
                    metrics.notification_errors += 1;
                    drop(metrics);
                    self.diag(
                        Severity::Warning,
                        "channel_full",
                        "event dropped: channel enqueue timed out",
                    );
                }
            }
        }

        if self.inner.config.adaptive_sampling {
            if let Ok(usage) = self.inner.source.lock().expect("source mutex poisoned").self_usage() {
                self.maybe_adjust_interval(usage.cpu_percent);
            }
        }

        ScanOutcome { events }
    }

    /// Apply the adaptive-interval formula from the contract, rate-limited
    /// to at most once per second to avoid thrashing the ticker on
    /// borderline CPU readings.
    fn maybe_adjust_interval(&self, cpu_observed: f64) {
        let mut last_change = self
            .inner
            .last_interval_change
            .lock()
            .expect("last_interval_change mutex poisoned");
        if let Some(last) = *last_change {
            if last.elapsed() < Duration::from_secs(1) {
                return;
            }
        }

        let limit = self.inner.config.max_cpu_usage;
        if limit <= 0.0 {
            return;
        }
        let r = cpu_observed / limit;
        let baseline = self.inner.config.scan_interval;
        let mut current = self.inner.current_interval.lock().expect("interval mutex poisoned");

        let new_interval = if r > 1.2 {
            Some((*current).mul_f64(r * 1.2).min(Duration::from_secs(60)))
        } else if r < 0.5 && *current > baseline {
            Some((*current).mul_f64(0.8).max(baseline))
        } else {
            None
        };

        if let Some(new_interval) = new_interval {
            if new_interval != *current {
                *current = new_interval;
                *last_change = Some(Instant::now());
                drop(current);
                drop(last_change);
                let mut metrics = self.inner.metrics.lock().expect("metrics mutex poisoned");
                metrics.adaptive_rate_changes += 1;
                drop(metrics);
                self.diag(
                    Severity::Info,
                    "adaptive_rate_change",
                    format!("scan interval adjusted to {new_interval:?} (r={r:.2})"),
                );
            }
        }
    }

    /// Stop the tick loop and pump, returning to `Stopped`. Valid only from
    /// `Running`/`Paused`.
    pub async fn stop(&self) -> Result<()> {
        let status = self.status();
        if status != ScannerStatus::Running && status != ScannerStatus::Paused {
            return Err(ScanError::InvalidState(format!(
                "cannot stop scanner from status {status:?}"
            )));
        }
        self.inner.cancel.lock().expect("cancel mutex poisoned").cancel();
        if let Some(handle) = self.inner.tick_task.lock().expect("tick_task mutex poisoned").take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.inner.pump_task.lock().expect("pump_task mutex poisoned").take() {
            if let Ok(rx) = handle.await {
                *self.inner.event_rx.lock().expect("event_rx mutex poisoned") = Some(rx);
            }
        }
        self.set_status(ScannerStatus::Stopped);
        Ok(())
    }

    /// Stop (if running) and release the process cache and platform
    /// resources. Terminal: a scanner that has been shut down is started
    /// again only via a fresh `Scanner::new`.
    pub async fn shutdown(&self) -> Result<()> {
        if self.status() == ScannerStatus::Running || self.status() == ScannerStatus::Paused {
            self.stop().await?;
        }
        self.inner.cache.lock().expect("cache mutex poisoned").clear();
        self.set_status(ScannerStatus::Stopped);
        Ok(())
    }
}

/// The Scanner's own CPU/memory footprint and running-task count, for the
/// Watchdog's monitoring loop. `file_descriptors` is always 0: `sysinfo`
/// does not expose per-process fd counts cross-platform (see
/// `ProcessInfo::fd_count`'s own doc comment), so there is nothing
/// meaningful to report here either.
impl Monitorable for Scanner {
    fn resource_usage(&self) -> ComponentResourceUsage {
        let usage = self.resources().unwrap_or_default();
        let tasks = if self.status() == ScannerStatus::Running { 2 } else { 0 };
        ComponentResourceUsage {
            cpu_percent: usage.cpu_percent,
            memory_mb: usage.memory_bytes / (1024 * 1024),
            file_descriptors: 0,
            tasks,
        }
    }

    fn health(&self) -> HealthStatus {
        match self.status() {
            ScannerStatus::Error => HealthStatus::Unhealthy("scanner is in Error status".into()),
            _ => HealthStatus::Healthy,
        }
    }
}

impl Restartable for Scanner {
    fn shutdown(&self, deadline: Duration) -> BoxFuture<'_, std::result::Result<(), String>> {
        Box::pin(async move {
            match tokio::time::timeout(deadline, self.stop()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(err.to_string()),
                Err(_) => Err("scanner shutdown timed out".to_string()),
            }
        })
    }

    fn start(&self) -> BoxFuture<'_, std::result::Result<(), String>> {
        Box::pin(async move { Scanner::start(self).map_err(|err| err.to_string()) })
    }

    fn is_running(&self) -> bool {
        self.status() == ScannerStatus::Running
    }
}

/// Degradation steps down the scan rate: level N polls at
/// `baseline * (1 + N)`, the `reduce_scan_frequency` action the contract
/// names explicitly. Level 0 restores the configured baseline.
impl Degradable for Scanner {
    fn set_degradation_level(&self, level: u8) -> std::result::Result<(), String> {
        self.inner.degradation_level.store(level, Ordering::SeqCst);
        let baseline = self.inner.config.scan_interval;
        let mut current = self.inner.current_interval.lock().expect("interval mutex poisoned");
        *current = baseline.mul_f64(1.0 + level as f64);
        Ok(())
    }

    fn get_degradation_level(&self) -> u8 {
        self.inner.degradation_level.load(Ordering::SeqCst)
    }
}

fn now_ns() -> u64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0) as u64
}
