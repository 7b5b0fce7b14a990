//! Agent shell: owns the `AgentConfig`, instantiates the Process Scanner,
//! Top-N Sampler, and Watchdog, and wires them together on one `tokio`
//! multi-thread runtime.
//!
//! The Sampler has no independent config-level tick interval of its own
//! (§10 defines no such key): it scores whatever batch the Scanner's cache
//! currently holds, so this crate ticks it on the Scanner's own
//! `scan_interval`, widened by the Sampler's own degradation level through
//! `SharedSampler::effective_interval`. The Scanner's periodic tick loop is
//! internal to `pp-scan` and has no handle to the Watchdog (by design, see
//! `pp_common::capability`'s module doc), so this crate also runs a small
//! heartbeat-supervisor task that watches `Scanner::tick_count()` for
//! forward progress and relays a heartbeat to the Watchdog on its behalf.

pub mod diag;
pub mod error;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub use error::{AgentError, Result};

use pp_common::{Degradable, DiagSink, Monitorable, Restartable};
use pp_config::AgentConfig;
use pp_sample::{Sampler, SampleOutput, SharedSampler};
use pp_scan::source::{ProcessSource, SysinfoProcessSource};
use pp_scan::Scanner;
use pp_watchdog::{ComponentStatus, Watchdog};

use diag::TracingDiagSink;

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// The running agent's supervised background tasks, held so `run()` can
/// await their completion after cancellation.
struct Tasks {
    sample: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

/// Wires the four subsystems together and drives them on the runtime.
/// Cheaply cloneable, like the subsystem handles it holds.
#[derive(Clone)]
pub struct Agent {
    config: AgentConfig,
    entity_guid: String,
    scanner: Scanner,
    sampler: Arc<SharedSampler>,
    watchdog: Watchdog,
}

impl Agent {
    /// Validate `config`, construct every subsystem over the production
    /// `sysinfo`-backed `ProcessSource`, and register the Scanner and
    /// Sampler with the Watchdog. Fallible and async: the contract's
    /// `Agent::new(config) -> Agent` is realized here as
    /// `async fn new(config) -> Result<Agent>` since construction both
    /// validates (fallible) and registers components (the Watchdog's
    /// registry is behind a `tokio::sync::RwLock`).
    pub async fn new(config: AgentConfig) -> Result<Agent> {
        Self::with_process_source(config, Box::new(SysinfoProcessSource::new())).await
    }

    /// As `new`, but over a caller-supplied `ProcessSource` — the seam
    /// integration tests and the `once` CLI subcommand's dry-run mode use
    /// to drive the agent against the in-memory fixture instead of the
    /// real host.
    pub async fn with_process_source(config: AgentConfig, source: Box<dyn ProcessSource>) -> Result<Agent> {
        config.validate()?;

        let diag: Arc<dyn DiagSink> = Arc::new(TracingDiagSink);

        let scanner = Scanner::new(config.scanner.clone(), source, diag.clone())?;

        let sampler = Arc::new(SharedSampler::new(Sampler::new(
            config.sampler.clone(),
            config.sketch.clone(),
            diag.clone(),
        )));

        let watchdog = Watchdog::new(config.watchdog.clone(), diag.clone());

        watchdog
            .register_component(
                "scanner",
                Arc::new(scanner.clone()) as Arc<dyn Monitorable>,
                Some(Arc::new(scanner.clone()) as Arc<dyn Restartable>),
                Some(Arc::new(scanner.clone()) as Arc<dyn Degradable>),
            )
            .await
            .map_err(|source| AgentError::Registration { component: "scanner", source })?;

        watchdog
            .register_component(
                "sampler",
                sampler.clone() as Arc<dyn Monitorable>,
                Some(sampler.clone() as Arc<dyn Restartable>),
                Some(sampler.clone() as Arc<dyn Degradable>),
            )
            .await
            .map_err(|source| AgentError::Registration { component: "sampler", source })?;

        let entity_guid =
            std::env::var("HOSTNAME").unwrap_or_else(|_| "procpulse-agent".to_string());

        Ok(Agent { config, entity_guid, scanner, sampler, watchdog })
    }

    /// Start every subsystem's tick loop and run until `cancel` fires, then
    /// stop everything and return. The Scanner and Watchdog each spawn and
    /// own their internal tick tasks via their own `start()`; this spawns
    /// the two tasks this crate itself owns (the Sampler's tick loop and
    /// the Scanner heartbeat supervisor) and awaits all of them.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.scanner.start()?;
        self.watchdog.start()?;

        let tasks = self.spawn_tasks(cancel.clone());

        cancel.cancelled().await;

        self.scanner.stop().await?;
        self.watchdog.stop().await?;
        let _ = tasks.sample.await;
        let _ = tasks.heartbeat.await;
        Ok(())
    }

    fn spawn_tasks(&self, cancel: CancellationToken) -> Tasks {
        let sample = {
            let scanner = self.scanner.clone();
            let sampler = self.sampler.clone();
            let watchdog = self.watchdog.clone();
            let entity_guid = self.entity_guid.clone();
            let baseline = self.config.scanner.scan_interval;
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_sample_ticks(scanner, sampler, watchdog, entity_guid, baseline, cancel).await
            })
        };

        let heartbeat = {
            let scanner = self.scanner.clone();
            let watchdog = self.watchdog.clone();
            let interval = self.config.watchdog.deadlock_detection.heartbeat_interval;
            tokio::spawn(async move { run_heartbeat_supervisor(scanner, watchdog, interval, cancel).await })
        };

        Tasks { sample, heartbeat }
    }

    /// Force one scan-and-sample cycle out of band, independent of the
    /// running tick loops. Used by the CLI's `once` subcommand and by
    /// integration tests. The resulting batch is retrievable afterward via
    /// `last_output()`.
    pub async fn force_scan(&self) -> Result<()> {
        self.scanner.force_scan().await;
        if let Ok(usage) = self.scanner.resources() {
            self.sampler.report_self_cpu(usage.cpu_percent);
        }
        let batch = self.scanner.cached();
        self.sampler.observe(&batch, now_ns(), &self.entity_guid)?;
        Ok(())
    }

    /// The output of the most recently completed sample tick, if any.
    pub fn last_output(&self) -> Option<SampleOutput> {
        self.sampler.last_output()
    }

    /// Every registered component's current Watchdog status, keyed by name.
    pub async fn statuses(&self) -> std::collections::HashMap<String, ComponentStatus> {
        self.watchdog.get_all_statuses().await
    }
}

async fn run_sample_ticks(
    scanner: Scanner,
    sampler: Arc<SharedSampler>,
    watchdog: Watchdog,
    entity_guid: String,
    baseline: Duration,
    cancel: CancellationToken,
) {
    loop {
        let interval = sampler.effective_interval(baseline);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                sample_tick(&scanner, &sampler, &entity_guid).instrument(tracing::debug_span!("sample_tick")).await;
                let _ = watchdog.heartbeat("sampler").await;
            }
        }
    }
}

async fn sample_tick(scanner: &Scanner, sampler: &Arc<SharedSampler>, entity_guid: &str) {
    if let Ok(usage) = scanner.resources() {
        sampler.report_self_cpu(usage.cpu_percent);
    }
    let batch = scanner.cached();
    if let Err(err) = sampler.observe(&batch, now_ns(), entity_guid) {
        tracing::warn!(component = "sampler", error = %err, "sample tick failed");
    }
}

async fn run_heartbeat_supervisor(scanner: Scanner, watchdog: Watchdog, interval: Duration, cancel: CancellationToken) {
    let mut last_ticks = scanner.tick_count();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let ticks = scanner.tick_count();
                if ticks != last_ticks {
                    let _ = watchdog.heartbeat("scanner").await;
                    last_ticks = ticks;
                }
            }
        }
    }
}
