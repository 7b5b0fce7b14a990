//! Watchdog: resource monitoring, circuit breakers, degradation levels, and
//! restart policy for every other subsystem.
//!
//! A registered component is discovered by capability, not by inheritance:
//! every component is `Monitorable`, and independently may also be
//! `Restartable` and/or `Degradable`. The monitor loop polls each
//! component's resource usage once per `monitor_interval`, feeds breaches
//! into a per-component circuit breaker, steps degradation levels in
//! response, and drives the restart policy once a circuit opens.
//!
//! Degradation-stepping severity is read from the component's own
//! `HealthStatus` at the moment of a breach: `Unhealthy` steps straight to
//! the maximum configured level, `Degraded` steps by one, and a breach
//! reported alongside `Healthy` still steps by one (the breach itself is
//! signal enough to ease off). See `DESIGN.md` for why this reads
//! `HealthStatus` rather than an incident-severity field that resource
//! breaches never actually populate above `warning`.

pub mod breaker;
pub mod deadlock;
pub mod error;
pub mod incident;
pub mod restart;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pp_common::{
    AgentDiagEvent, ComponentResourceUsage, Degradable, DiagSink, HealthStatus, Monitorable, NullDiagSink,
    Restartable, Severity,
};
use pp_config::{ResourceThresholds, WatchdogConfig};

pub use breaker::{CircuitBreaker, CircuitState, CircuitTransition};
pub use deadlock::HeartbeatTracker;
pub use error::{Result, WatchdogError};
pub use incident::{Incident, IncidentKind, IncidentRing};
pub use restart::RestartState;

/// The watchdog's own lifecycle, independent of any component's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    Initialized,
    Running,
    Stopped,
}

/// A snapshot of one registered component's health, returned by
/// `get_status`/`get_all_statuses`.
#[derive(Debug, Clone)]
pub struct ComponentStatus {
    pub circuit_state: CircuitState,
    pub degradation_level: Option<u8>,
    pub restart_attempts: u32,
    pub consecutive_heartbeat_misses: u32,
    pub recent_incidents: Vec<Incident>,
    pub recent_usage: Vec<ComponentResourceUsage>,
}

struct ComponentRecord {
    monitorable: Arc<dyn Monitorable>,
    restartable: Option<Arc<dyn Restartable>>,
    degradable: Option<Arc<dyn Degradable>>,
    thresholds: Mutex<ResourceThresholds>,
    breaker: Mutex<CircuitBreaker>,
    restart: Mutex<RestartState>,
    deadlock: Mutex<HeartbeatTracker>,
    incidents: Mutex<IncidentRing>,
    usage_cap: usize,
    usage_history: Mutex<VecDeque<ComponentResourceUsage>>,
}

struct Inner {
    config: Mutex<WatchdogConfig>,
    registry: RwLock<HashMap<String, Arc<ComponentRecord>>>,
    status: Mutex<WatchdogStatus>,
    diag: Arc<dyn DiagSink>,
    cancel: Mutex<CancellationToken>,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

/// The Watchdog. Cheaply cloneable, like `Scanner` and for the same reason:
/// the agent shell needs a handle alongside the component it registers.
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<Inner>,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig, diag: Arc<dyn DiagSink>) -> Self {
        let inner = Inner {
            config: Mutex::new(config),
            registry: RwLock::new(HashMap::new()),
            status: Mutex::new(WatchdogStatus::Initialized),
            diag,
            cancel: Mutex::new(CancellationToken::new()),
            monitor_task: Mutex::new(None),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn with_null_diag(config: WatchdogConfig) -> Self {
        Self::new(config, Arc::new(NullDiagSink))
    }

    fn diag(&self, severity: Severity, event_type: &str, message: impl Into<String>) {
        self.inner
            .diag
            .emit(AgentDiagEvent::new(severity, "watchdog", event_type, message));
    }

    pub fn status(&self) -> WatchdogStatus {
        *self.inner.status.lock().expect("status mutex poisoned")
    }

    fn config(&self) -> WatchdogConfig {
        self.inner.config.lock().expect("config mutex poisoned").clone()
    }

    /// Register a component. `restartable` and `degradable` are independent
    /// optional capabilities; a component may supply neither, either, or
    /// both, alongside the mandatory `monitorable`. Thresholds default to
    /// `config.resource_thresholds[name]` if present, else compiled
    /// defaults; call `set_thresholds` afterward to override.
    pub async fn register_component(
        &self,
        name: impl Into<String>,
        monitorable: Arc<dyn Monitorable>,
        restartable: Option<Arc<dyn Restartable>>,
        degradable: Option<Arc<dyn Degradable>>,
    ) -> Result<()> {
        let name = name.into();
        let config = self.config();
        let thresholds = config.resource_thresholds.get(&name).copied().unwrap_or_default();
        let max_events = config.diagnostic.max_events;
        let now = Instant::now();
        let record = ComponentRecord {
            monitorable,
            restartable,
            degradable,
            thresholds: Mutex::new(thresholds),
            breaker: Mutex::new(CircuitBreaker::new(config.circuit_breaker)),
            restart: Mutex::new(RestartState::new(config.restart)),
            deadlock: Mutex::new(HeartbeatTracker::new(config.deadlock_detection, now)),
            incidents: Mutex::new(IncidentRing::new(max_events)),
            usage_cap: max_events.max(1),
            usage_history: Mutex::new(VecDeque::with_capacity(max_events.max(1))),
        };
        self.inner.registry.write().await.insert(name.clone(), Arc::new(record));
        self.diag(Severity::Info, "component_registered", format!("registered {name}"));
        Ok(())
    }

    pub async fn unregister_component(&self, name: &str) -> Result<()> {
        let removed = self.inner.registry.write().await.remove(name);
        if removed.is_none() {
            return Err(WatchdogError::NotRegistered(name.to_string()));
        }
        self.diag(Severity::Info, "component_unregistered", format!("unregistered {name}"));
        Ok(())
    }

    pub async fn set_thresholds(&self, name: &str, thresholds: ResourceThresholds) -> Result<()> {
        let registry = self.inner.registry.read().await;
        let record = registry.get(name).ok_or_else(|| WatchdogError::NotRegistered(name.to_string()))?;
        *record.thresholds.lock().expect("thresholds mutex poisoned") = thresholds;
        Ok(())
    }

    /// Record a liveness signal from `name`'s own tick loop. The core
    /// drives this once per cycle for every registered component, per the
    /// contract's deadlock-detection section.
    pub async fn heartbeat(&self, name: &str) -> Result<()> {
        let registry = self.inner.registry.read().await;
        let record = registry.get(name).ok_or_else(|| WatchdogError::NotRegistered(name.to_string()))?;
        record.deadlock.lock().expect("deadlock mutex poisoned").heartbeat(Instant::now());
        Ok(())
    }

    pub async fn get_status(&self, name: &str) -> Result<ComponentStatus> {
        let registry = self.inner.registry.read().await;
        let record = registry.get(name).ok_or_else(|| WatchdogError::NotRegistered(name.to_string()))?;
        Ok(Self::snapshot(record))
    }

    pub async fn get_all_statuses(&self) -> HashMap<String, ComponentStatus> {
        let registry = self.inner.registry.read().await;
        registry.iter().map(|(name, record)| (name.clone(), Self::snapshot(record))).collect()
    }

    fn snapshot(record: &ComponentRecord) -> ComponentStatus {
        let circuit_state = record.breaker.lock().expect("breaker mutex poisoned").state();
        let degradation_level = record.degradable.as_ref().map(|d| d.get_degradation_level());
        let restart_attempts = record.restart.lock().expect("restart mutex poisoned").attempts();
        let consecutive_heartbeat_misses =
            record.deadlock.lock().expect("deadlock mutex poisoned").consecutive_misses();
        let recent_incidents = record.incidents.lock().expect("incidents mutex poisoned").iter().cloned().collect();
        let recent_usage = record.usage_history.lock().expect("usage mutex poisoned").iter().copied().collect();
        ComponentStatus {
            circuit_state,
            degradation_level,
            restart_attempts,
            consecutive_heartbeat_misses,
            recent_incidents,
            recent_usage,
        }
    }

    /// Start the monitor loop. Valid only from `Initialized`/`Stopped`.
    pub fn start(&self) -> Result<()> {
        let status = self.status();
        if status == WatchdogStatus::Running {
            return Err(WatchdogError::InvalidState(format!("cannot start watchdog from status {status:?}")));
        }
        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().expect("cancel mutex poisoned") = cancel.clone();

        let watchdog = self.clone();
        let handle = tokio::spawn(async move { watchdog.run_ticks(cancel).await });
        *self.inner.monitor_task.lock().expect("monitor_task mutex poisoned") = Some(handle);
        *self.inner.status.lock().expect("status mutex poisoned") = WatchdogStatus::Running;
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let status = self.status();
        if status != WatchdogStatus::Running {
            return Err(WatchdogError::InvalidState(format!("cannot stop watchdog from status {status:?}")));
        }
        self.inner.cancel.lock().expect("cancel mutex poisoned").cancel();
        if let Some(handle) = self.inner.monitor_task.lock().expect("monitor_task mutex poisoned").take() {
            let _ = handle.await;
        }
        *self.inner.status.lock().expect("status mutex poisoned") = WatchdogStatus::Stopped;
        Ok(())
    }

    async fn run_ticks(&self, cancel: CancellationToken) {
        loop {
            let interval = self.config().monitor_interval;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    self.force_check().await;
                }
            }
        }
    }

    /// Run exactly one monitor cycle out of band, independent of the
    /// ticking task. Used by tests and by a future liveness-probe CLI path.
    pub async fn force_check(&self) {
        let names: Vec<String> = self.inner.registry.read().await.keys().cloned().collect();
        for name in names {
            let record = {
                let registry = self.inner.registry.read().await;
                match registry.get(&name) {
                    Some(record) => record.clone(),
                    None => continue,
                }
            };
            self.monitor_one(&name, &record).await;
        }
    }

    async fn monitor_one(&self, name: &str, record: &Arc<ComponentRecord>) {
        let now = Instant::now();
        let usage = record.monitorable.resource_usage();
        let health = record.monitorable.health();

        {
            let mut history = record.usage_history.lock().expect("usage mutex poisoned");
            if history.len() >= record.usage_cap {
                history.pop_front();
            }
            history.push_back(usage);
        }

        let thresholds = *record.thresholds.lock().expect("thresholds mutex poisoned");
        let breach = check_thresholds(&usage, &thresholds);
        let unhealthy = matches!(health, HealthStatus::Unhealthy(_));

        if breach.is_some() || unhealthy {
            if let Some((resource, observed, limit)) = breach {
                let incident = Incident::new(
                    IncidentKind::ResourceBreach { resource, observed, limit },
                    Some(usage),
                );
                self.diag(Severity::Warning, "resource_breach", incident.kind.description());
                record.incidents.lock().expect("incidents mutex poisoned").push(incident);
            }

            let transitions = record.breaker.lock().expect("breaker mutex poisoned").record_failure(now);
            self.handle_transitions(name, record, transitions, now).await;

            if let Some(degradable) = &record.degradable {
                let max_level = self.config().degradation_levels.saturating_sub(1);
                let target = match &health {
                    HealthStatus::Unhealthy(_) => max_level,
                    HealthStatus::Degraded(_) | HealthStatus::Healthy => {
                        degradable.get_degradation_level().saturating_add(1).min(max_level)
                    }
                };
                if target != degradable.get_degradation_level() {
                    if degradable.set_degradation_level(target).is_err() {
                        self.diag(
                            Severity::Warning,
                            "degradation_step_failed",
                            format!("{name} rejected degradation level {target}"),
                        );
                    }
                }
            }
        } else {
            let transitions = record.breaker.lock().expect("breaker mutex poisoned").record_success(now);
            let closed = record.breaker.lock().expect("breaker mutex poisoned").state() == CircuitState::Closed;
            self.handle_transitions(name, record, transitions, now).await;

            if closed {
                if let Some(degradable) = &record.degradable {
                    if degradable.get_degradation_level() != 0 {
                        let _ = degradable.set_degradation_level(0);
                    }
                }
            }
        }

        let deadlock_fired = {
            let mut tracker = record.deadlock.lock().expect("deadlock mutex poisoned");
            tracker.check(now)
        };
        if deadlock_fired {
            let misses = record.deadlock.lock().expect("deadlock mutex poisoned").consecutive_misses();
            let incident = Incident::new(
                IncidentKind::DeadlockSuspected {
                    missed_heartbeats: misses,
                    outstanding_tasks: vec![name.to_string()],
                },
                Some(usage),
            );
            self.diag(Severity::Critical, "deadlock_suspected", incident.kind.description());
            record.incidents.lock().expect("incidents mutex poisoned").push(incident);
        }
    }

    /// React to circuit-breaker transitions: diagnose every transition, and
    /// drive the restart policy whenever a component opens (or reopens)
    /// and is `Restartable`.
    async fn handle_transitions(
        &self,
        name: &str,
        record: &Arc<ComponentRecord>,
        transitions: Vec<CircuitTransition>,
        now: Instant,
    ) {
        for transition in transitions {
            self.diag(
                Severity::Info,
                "circuit_transition",
                format!("{name}: {} -> {}", transition.from, transition.to),
            );
            if transition.to == CircuitState::Open {
                self.maybe_restart(name, record, now).await;
            }
        }
    }

    async fn maybe_restart(&self, name: &str, record: &Arc<ComponentRecord>, now: Instant) {
        let Some(restartable) = &record.restartable else { return };
        let eligible = record.restart.lock().expect("restart mutex poisoned").eligible(now);
        if !eligible {
            return;
        }
        let graceful_timeout = self.config().restart.graceful_shutdown_timeout;
        if let Err(err) = restartable.shutdown(graceful_timeout).await {
            self.diag(Severity::Warning, "shutdown_error", format!("{name}: graceful shutdown failed: {err}"));
        }
        match restartable.start().await {
            Ok(()) => {
                record.restart.lock().expect("restart mutex poisoned").record_success();
                self.diag(Severity::Info, "restart_succeeded", format!("{name} restarted"));
            }
            Err(err) => {
                let mut restart = record.restart.lock().expect("restart mutex poisoned");
                restart.record_failure(now);
                let attempt = restart.attempts();
                drop(restart);
                let incident = Incident::new(IncidentKind::RestartFailed { attempt, reason: err }, None);
                self.diag(Severity::Critical, "restart_failed", incident.kind.description());
                record.incidents.lock().expect("incidents mutex poisoned").push(incident);
            }
        }
    }
}

fn check_thresholds(
    usage: &ComponentResourceUsage,
    thresholds: &ResourceThresholds,
) -> Option<(&'static str, f64, f64)> {
    if thresholds.max_cpu_percent > 0.0 && usage.cpu_percent > thresholds.max_cpu_percent {
        return Some(("cpu_percent", usage.cpu_percent, thresholds.max_cpu_percent));
    }
    if thresholds.max_memory_mb > 0 && usage.memory_mb > thresholds.max_memory_mb {
        return Some(("memory_mb", usage.memory_mb as f64, thresholds.max_memory_mb as f64));
    }
    if thresholds.max_file_descriptors > 0 && usage.file_descriptors > thresholds.max_file_descriptors {
        return Some((
            "file_descriptors",
            usage.file_descriptors as f64,
            thresholds.max_file_descriptors as f64,
        ));
    }
    if thresholds.max_tasks > 0 && usage.tasks > thresholds.max_tasks {
        return Some(("tasks", usage.tasks as f64, thresholds.max_tasks as f64));
    }
    None
}
