//! `ProcessEnvelope` v2.1: the batch shape the Top-N Sampler hands to an
//! external exporter. Field tags at or below [`crate::schema::FROZEN_FIELD_TAG_MAX`]
//! are frozen; new fields are appended, never inserted.
//!
//! `SketchEnvelope` carries a sketch already flattened to its wire bytes
//! (see `pp_sketch::wire`) rather than the live `DDSketch`, so this crate
//! does not need a dependency on `pp-sketch` to describe the batch shape
//! that travels off-host.

use serde::{Deserialize, Serialize};

use crate::id::ProcessId;
use crate::process::ProcessState;
use crate::schema::PROCESS_ENVELOPE_SCHEMA_VERSION;

/// One retained row of a `TopNBatch`: an explicit, unaggregated snapshot of
/// a single high-scoring process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNEntry {
    pub pid: ProcessId,
    pub ppid: ProcessId,
    pub name: String,
    pub command: Vec<String>,
    pub user: String,
    pub cpu_percent: f64,
    pub rss_bytes: u64,
    pub vms_bytes: u64,
    pub fd_count: u64,
    pub thread_count: u64,
    pub state: ProcessState,
    pub start_time: u64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// A `DDSketch`, serialized to its wire bytes, tagged with the metric and
/// display-name group it summarizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchEnvelope {
    pub metric_name: String,
    pub gamma: f64,
    pub serialized_sketch: Vec<u8>,
    pub bucket_count: u32,
    pub last_updated: u64,
}

/// One tail aggregate row: every process sharing `display_name` that did
/// not make the Top-N, summarized by metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailAggregateRow {
    pub display_name: String,
    pub count: u64,
    pub cpu_sketch: SketchEnvelope,
    pub rss_sketch: SketchEnvelope,
}

/// The batch of explicit Top-N rows, emitted once per sampler tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNBatch {
    pub entity_guid: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub timestamp_ns: u64,
    pub entries: Vec<TopNEntry>,
}

fn default_schema_version() -> String {
    PROCESS_ENVELOPE_SCHEMA_VERSION.to_string()
}

impl TopNBatch {
    pub fn new(entity_guid: impl Into<String>, timestamp_ns: u64, entries: Vec<TopNEntry>) -> Self {
        Self {
            entity_guid: entity_guid.into(),
            schema_version: PROCESS_ENVELOPE_SCHEMA_VERSION.to_string(),
            timestamp_ns,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> TopNEntry {
        TopNEntry {
            pid: ProcessId(42),
            ppid: ProcessId(1),
            name: "worker".to_string(),
            command: vec!["worker".to_string(), "--id=1".to_string()],
            user: "root".to_string(),
            cpu_percent: 12.5,
            rss_bytes: 1024,
            vms_bytes: 4096,
            fd_count: 3,
            thread_count: 2,
            state: ProcessState::Running,
            start_time: 1_700_000_000,
            io_read_bytes: 0,
            io_write_bytes: 0,
            labels: vec!["env=prod".to_string()],
        }
    }

    #[test]
    fn top_n_batch_round_trips_through_json() {
        let batch = TopNBatch::new("guid-1", 1_000, vec![sample_entry()]);
        let json = serde_json::to_string(&batch).unwrap();
        let back: TopNBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(batch, back);
        assert_eq!(back.schema_version, PROCESS_ENVELOPE_SCHEMA_VERSION);
    }

    #[test]
    fn sketch_envelope_round_trips_through_json() {
        let envelope = SketchEnvelope {
            metric_name: "cpu".to_string(),
            gamma: 1.02,
            serialized_sketch: vec![1, 2, 3, 4],
            bucket_count: 7,
            last_updated: 9_000,
        };
        let row = TailAggregateRow {
            display_name: "worker".to_string(),
            count: 5,
            cpu_sketch: envelope.clone(),
            rss_sketch: envelope,
        };
        let json = serde_json::to_string(&row).unwrap();
        let back: TailAggregateRow = serde_json::from_str(&json).unwrap();
        assert_eq!(row, back);
    }

    #[test]
    fn omitted_schema_version_falls_back_to_current() {
        let json = r#"{"entity_guid":"g","timestamp_ns":1,"entries":[]}"#;
        let batch: TopNBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.schema_version, PROCESS_ENVELOPE_SCHEMA_VERSION);
    }
}
