//! Thin CLI wrapper around `pp_core::Agent`: resolves configuration,
//! installs structured logging, then dispatches to one of three
//! subcommands (`run`, `once`, `status`).

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pp_config::{resolve_config, AgentConfig, CliOverrides, ConfigPaths};
use pp_core::{Agent, AgentError};

#[derive(Parser)]
#[command(name = "pp-core", version, about = "Host-resident telemetry-distillation agent")]
struct Cli {
    /// Path to a TOML config file; falls back to $XDG_CONFIG_HOME/procpulse/config.toml.
    #[arg(long, global = true, env = "PP_CONFIG")]
    config: Option<PathBuf>,

    /// Raise the default log level to debug.
    #[arg(long, short = 'v', global = true, env = "PP_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon loop until SIGINT/SIGTERM, then shut down gracefully.
    Run,
    /// Force a single scan/sample tick and print the resulting batch as JSON.
    Once,
    /// Print every registered component's Watchdog status as JSON.
    Status,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let paths = ConfigPaths { explicit: cli.config.clone() };
    let overrides = CliOverrides { verbose: cli.verbose, ..Default::default() };
    let config = match resolve_config(&paths, &overrides) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to resolve configuration");
            return std::process::ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Command::Run => run_daemon(config).await,
        Command::Once => run_once(config).await,
        Command::Status => run_status(config).await,
    };

    match outcome {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "agent exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(if verbose { "debug" } else { "info" }));

    if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).compact().try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
    }
}

async fn run_daemon(config: AgentConfig) -> Result<(), AgentError> {
    let agent = Agent::new(config).await?;
    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received, stopping agent");
        shutdown_cancel.cancel();
    });
    agent.run(cancel).await
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn run_once(config: AgentConfig) -> Result<(), AgentError> {
    let agent = Agent::new(config).await?;
    agent.force_scan().await?;
    match agent.last_output() {
        Some(output) => {
            let json = serde_json::to_string_pretty(&output).expect("serialize sample output");
            println!("{json}");
        }
        None => tracing::warn!("scan completed but produced no sample output"),
    }
    Ok(())
}

async fn run_status(config: AgentConfig) -> Result<(), AgentError> {
    let agent = Agent::new(config).await?;
    let statuses = agent.statuses().await;
    let report: BTreeMap<String, StatusReport> =
        statuses.into_iter().map(|(name, status)| (name, StatusReport::from(status))).collect();
    let json = serde_json::to_string_pretty(&report).expect("serialize status report");
    println!("{json}");
    Ok(())
}

/// A JSON-friendly projection of `pp_watchdog::ComponentStatus`. The
/// internal type stays free of a `serde` dependency; this is the one place
/// that needs it, for the `status` subcommand's output.
#[derive(Serialize)]
struct StatusReport {
    circuit_state: String,
    degradation_level: Option<u8>,
    restart_attempts: u32,
    consecutive_heartbeat_misses: u32,
    recent_incidents: Vec<String>,
}

impl From<pp_watchdog::ComponentStatus> for StatusReport {
    fn from(status: pp_watchdog::ComponentStatus) -> Self {
        Self {
            circuit_state: status.circuit_state.to_string(),
            degradation_level: status.degradation_level,
            restart_attempts: status.restart_attempts,
            consecutive_heartbeat_misses: status.consecutive_heartbeat_misses,
            recent_incidents: status.recent_incidents.iter().map(|i| i.kind.description()).collect(),
        }
    }
}
