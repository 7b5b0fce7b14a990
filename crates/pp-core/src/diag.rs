//! Bridges `AgentDiagEvent`s into the `tracing` stream, per §11: every
//! diagnostic emitted anywhere in the agent is also a `tracing` event at
//! the matching level, tagged with `component` and `type` fields, so a
//! plain `tracing-subscriber` layer gives the same visibility the export
//! pipeline would.

use pp_common::{AgentDiagEvent, DiagSink, Severity};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagSink;

impl DiagSink for TracingDiagSink {
    fn emit(&self, event: AgentDiagEvent) {
        match event.severity {
            Severity::Info => tracing::info!(
                component = %event.component,
                r#type = %event.event_type,
                id = %event.id,
                "{}",
                event.message
            ),
            Severity::Warning => tracing::warn!(
                component = %event.component,
                r#type = %event.event_type,
                id = %event.id,
                "{}",
                event.message
            ),
            Severity::Critical => tracing::error!(
                component = %event.component,
                r#type = %event.event_type,
                id = %event.id,
                "{}",
                event.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_does_not_panic_at_any_severity() {
        let sink = TracingDiagSink;
        sink.emit(AgentDiagEvent::new(Severity::Info, "scanner", "scan_tick", "ok"));
        sink.emit(AgentDiagEvent::new(Severity::Warning, "sampler", "churn_high", "busy"));
        sink.emit(AgentDiagEvent::new(Severity::Critical, "watchdog", "restart_failed", "boom"));
    }
}
