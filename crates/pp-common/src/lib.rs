//! Shared types for the telemetry-distillation core.
//!
//! This crate provides foundational types used across `pp-scan`,
//! `pp-sample`, `pp-sketch`, and `pp-watchdog`:
//! - Process identity (`pid`, `start_time`)
//! - Schema version constants for wire types
//! - The diagnostic event sink (`AgentDiagEvent`)
//! - Common configuration/state errors

pub mod capability;
pub mod diag;
pub mod envelope;
pub mod error;
pub mod id;
pub mod process;
pub mod schema;

pub use capability::{BoxFuture, ComponentResourceUsage, Degradable, HealthStatus, Monitorable, Restartable};
pub use diag::{AgentDiagEvent, CollectingDiagSink, DetailValue, DiagSink, NullDiagSink, Severity};
pub use envelope::{SketchEnvelope, TailAggregateRow, TopNBatch, TopNEntry};
pub use error::{Error, Result};
pub use id::{ProcessId, ProcessIdentity};
pub use process::{ProcessDelta, ProcessEvent, ProcessInfo, ProcessState};
