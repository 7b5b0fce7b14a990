//! The diagnostic event sink shared by every subsystem.
//!
//! Every state transition that could affect telemetry fidelity — a scan
//! error, a dropped event, a sketch fallback, a circuit-breaker trip, a
//! restart — is reified as an `AgentDiagEvent` rather than logged and
//! forgotten. Subsystems construct events through the `DiagEvent` builder
//! helpers on `Severity`; the watchdog and agent shell are responsible for
//! routing them into the bounded ring (`pp_watchdog::diagnostics`) and the
//! structured log stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A single structured detail value attached to a diagnostic event.
///
/// Kept deliberately narrow (no nested maps/arrays) since every value here
/// must also be representable as a `tracing` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for DetailValue {
    fn from(v: &str) -> Self {
        DetailValue::String(v.to_string())
    }
}
impl From<String> for DetailValue {
    fn from(v: String) -> Self {
        DetailValue::String(v)
    }
}
impl From<i64> for DetailValue {
    fn from(v: i64) -> Self {
        DetailValue::Int(v)
    }
}
impl From<u64> for DetailValue {
    fn from(v: u64) -> Self {
        DetailValue::Int(v as i64)
    }
}
impl From<usize> for DetailValue {
    fn from(v: usize) -> Self {
        DetailValue::Int(v as i64)
    }
}
impl From<f64> for DetailValue {
    fn from(v: f64) -> Self {
        DetailValue::Float(v)
    }
}
impl From<bool> for DetailValue {
    fn from(v: bool) -> Self {
        DetailValue::Bool(v)
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::String(s) => write!(f, "{s}"),
            DetailValue::Int(i) => write!(f, "{i}"),
            DetailValue::Float(v) => write!(f, "{v}"),
            DetailValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A first-class diagnostic record, the system's single emission sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDiagEvent {
    pub id: String,
    pub ts_ns: u64,
    pub severity: Severity,
    pub component: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, DetailValue>,
}

impl AgentDiagEvent {
    /// Construct a new event with the current wall-clock timestamp.
    pub fn new(
        severity: Severity,
        component: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let ts_ns = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .max(0) as u64;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts_ns,
            severity,
            component: component.into(),
            event_type: event_type.into(),
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail field, builder-style.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// The sink every subsystem emits `AgentDiagEvent`s into. Kept as a plain
/// synchronous capability (not an async trait) so `pp-common` stays free of
/// a runtime dependency; an async caller backs it with an unbounded
/// channel sender, whose `send` is itself synchronous and non-blocking.
pub trait DiagSink: Send + Sync {
    fn emit(&self, event: AgentDiagEvent);
}

/// Discards every event. The default for components constructed without a
/// wired diagnostic sink, e.g. standalone unit tests of a single subsystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagSink;

impl DiagSink for NullDiagSink {
    fn emit(&self, _event: AgentDiagEvent) {}
}

/// Collects emitted events in-process, for assertions in tests that need to
/// observe diagnostics without wiring a real export pipeline.
#[derive(Debug, Default)]
pub struct CollectingDiagSink {
    events: std::sync::Mutex<Vec<AgentDiagEvent>>,
}

impl CollectingDiagSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentDiagEvent> {
        self.events.lock().expect("diag sink mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("diag sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagSink for CollectingDiagSink {
    fn emit(&self, event: AgentDiagEvent) {
        self.events.lock().expect("diag sink mutex poisoned").push(event);
    }
}
