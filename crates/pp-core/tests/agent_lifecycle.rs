//! End-to-end tests driving `Agent` against an in-memory process source,
//! never touching the real host.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pp_common::{ProcessId, ProcessInfo, ProcessState};
use pp_config::AgentConfig;
use pp_core::Agent;
use pp_scan::source::InMemoryProcessSource;

fn proc(pid: u32, name: &str, cpu: f64, rss_bytes: u64) -> ProcessInfo {
    ProcessInfo {
        pid: ProcessId(pid),
        start_time: 1,
        ppid: ProcessId(0),
        name: name.to_string(),
        executable: format!("/bin/{name}"),
        command: vec![name.to_string()],
        user: "root".into(),
        state: ProcessState::Running,
        cpu_percent: cpu,
        rss_bytes,
        vms_bytes: rss_bytes * 2,
        fd_count: 4,
        thread_count: 1,
        io_read_bytes: 0,
        io_write_bytes: 0,
        last_updated: 0,
        attributes: BTreeMap::new(),
    }
}

fn fast_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.scanner.scan_interval = Duration::from_millis(5);
    config.watchdog.deadlock_detection.heartbeat_interval = Duration::from_millis(5);
    config
}

#[tokio::test]
async fn agent_registers_both_components_and_reports_healthy_on_construction() {
    let source = Box::new(InMemoryProcessSource::new(vec![vec![proc(1, "a", 1.0, 1024)]]));
    let agent = Agent::with_process_source(fast_config(), source).await.unwrap();

    let statuses = agent.statuses().await;
    assert_eq!(statuses.len(), 2);
    assert!(statuses.contains_key("scanner"));
    assert!(statuses.contains_key("sampler"));
}

#[tokio::test]
async fn force_scan_twice_reflects_the_second_snapshot() {
    let source = Box::new(InMemoryProcessSource::new(vec![
        vec![proc(1, "a", 1.0, 1024)],
        vec![proc(1, "a", 50.0, 1024), proc(2, "b", 30.0, 2048)],
    ]));
    let agent = Agent::with_process_source(fast_config(), source).await.unwrap();

    agent.force_scan().await.unwrap();
    assert_eq!(agent.last_output().unwrap().top.entries.len(), 1);

    agent.force_scan().await.unwrap();
    assert_eq!(agent.last_output().unwrap().top.entries.len(), 2);
}

#[tokio::test]
async fn run_loop_advances_scanner_tick_count_and_stops_on_cancellation() {
    let snapshots: Vec<Vec<ProcessInfo>> =
        (0..20).map(|i| vec![proc(1, "a", i as f64, 1024)]).collect();
    let source = Box::new(InMemoryProcessSource::new(snapshots));
    let agent = Agent::with_process_source(fast_config(), source).await.unwrap();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move { agent.run(cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(80)).await;
    cancel.cancel();

    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn run_loop_keeps_the_watchdog_reporting_both_components_healthy() {
    let snapshots: Vec<Vec<ProcessInfo>> =
        (0..20).map(|i| vec![proc(1, "a", i as f64, 1024)]).collect();
    let source = Box::new(InMemoryProcessSource::new(snapshots));
    let agent = Agent::with_process_source(fast_config(), source).await.unwrap();
    let agent_for_status = agent.clone();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move { agent.run(cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(80)).await;

    let statuses = agent_for_status.statuses().await;
    assert_eq!(statuses.len(), 2);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
