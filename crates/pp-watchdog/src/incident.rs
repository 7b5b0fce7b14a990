//! Incidents: the watchdog's own record of what went wrong with a
//! component, independent of the `AgentDiagEvent`s mirrored out through
//! `pp_common::diag`. Kept per-component in a bounded ring sized by
//! `pp_config::DiagnosticConfig::max_events`, the same key the spec already
//! defines for diagnostic retention rather than inventing a second one.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pp_common::ComponentResourceUsage;

#[derive(Debug, Clone, PartialEq)]
pub enum IncidentKind {
    ResourceBreach { resource: &'static str, observed: f64, limit: f64 },
    RestartFailed { attempt: u32, reason: String },
    DeadlockSuspected { missed_heartbeats: u32, outstanding_tasks: Vec<String> },
    CrashDetected { reason: String },
}

impl IncidentKind {
    /// Resource breach is `warning`; everything else (deadlock, restart
    /// failure, crash) is `critical`, matching the severity mapping in
    /// the watchdog's diagnostic-event contract.
    pub fn severity(&self) -> pp_common::Severity {
        match self {
            IncidentKind::ResourceBreach { .. } => pp_common::Severity::Warning,
            IncidentKind::RestartFailed { .. }
            | IncidentKind::DeadlockSuspected { .. }
            | IncidentKind::CrashDetected { .. } => pp_common::Severity::Critical,
        }
    }

    pub fn description(&self) -> String {
        match self {
            IncidentKind::ResourceBreach { resource, observed, limit } => {
                format!("{resource} at {observed:.2} exceeds limit {limit:.2}")
            }
            IncidentKind::RestartFailed { attempt, reason } => {
                format!("restart attempt {attempt} failed: {reason}")
            }
            IncidentKind::DeadlockSuspected { missed_heartbeats, outstanding_tasks } => {
                format!(
                    "{missed_heartbeats} consecutive missed heartbeats, {} tasks still outstanding: {}",
                    outstanding_tasks.len(),
                    outstanding_tasks.join(", ")
                )
            }
            IncidentKind::CrashDetected { reason } => format!("component crashed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub kind: IncidentKind,
    pub ts_ns: u64,
    pub usage: Option<ComponentResourceUsage>,
    pub suggested_remediation: &'static str,
}

impl Incident {
    pub fn new(kind: IncidentKind, usage: Option<ComponentResourceUsage>) -> Self {
        let suggested_remediation = match &kind {
            IncidentKind::ResourceBreach { .. } => "step degradation level or restart",
            IncidentKind::RestartFailed { .. } => "investigate component startup failure",
            IncidentKind::DeadlockSuspected { .. } => "inspect outstanding tasks, consider restart",
            IncidentKind::CrashDetected { .. } => "restart component",
        };
        let ts_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos() as u64;
        Self { kind, ts_ns, usage, suggested_remediation }
    }
}

/// A fixed-capacity FIFO ring: oldest incident is evicted first once full.
#[derive(Debug, Clone)]
pub struct IncidentRing {
    capacity: usize,
    items: VecDeque<Incident>,
}

impl IncidentRing {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), items: VecDeque::with_capacity(capacity.max(1)) }
    }

    pub fn push(&mut self, incident: Incident) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(incident);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Incident> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&Incident> {
        self.items.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_evicts_oldest_when_full() {
        let mut ring = IncidentRing::new(2);
        ring.push(Incident::new(
            IncidentKind::ResourceBreach { resource: "cpu", observed: 90.0, limit: 75.0 },
            None,
        ));
        ring.push(Incident::new(
            IncidentKind::ResourceBreach { resource: "cpu", observed: 91.0, limit: 75.0 },
            None,
        ));
        ring.push(Incident::new(
            IncidentKind::ResourceBreach { resource: "cpu", observed: 92.0, limit: 75.0 },
            None,
        ));
        assert_eq!(ring.len(), 2);
        let observed: Vec<f64> = ring
            .iter()
            .map(|i| match &i.kind {
                IncidentKind::ResourceBreach { observed, .. } => *observed,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(observed, vec![91.0, 92.0]);
    }

    #[test]
    fn severity_mapping_matches_contract() {
        assert_eq!(
            IncidentKind::ResourceBreach { resource: "cpu", observed: 1.0, limit: 2.0 }.severity(),
            pp_common::Severity::Warning
        );
        assert_eq!(
            IncidentKind::CrashDetected { reason: "x".into() }.severity(),
            pp_common::Severity::Critical
        );
    }
}
