//! Progress reporting for discovery and other long phases.
//!
//! Callers that want visibility pass a [`ProgressSink`]; the engine pushes
//! `{phase, item, outcome}` messages into it as work proceeds. There is no
//! event bus and no registration: a sink is handed in per call and dropped
//! when the call returns.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    Ok,
    Skipped,
    Failed,
}

impl fmt::Display for ProgressOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressOutcome::Ok => write!(f, "ok"),
            ProgressOutcome::Skipped => write!(f, "skipped"),
            ProgressOutcome::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent<'a> {
    pub phase: &'static str,
    pub item: &'a str,
    pub outcome: ProgressOutcome,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent<'_>);
}

/// Sink that drops every event. Used when the caller passes no sink.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: ProgressEvent<'_>) {}
}

/// Sink that collects events; handy in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: parking_lot::Mutex<Vec<(String, String, ProgressOutcome)>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<(String, String, ProgressOutcome)> {
        self.events.lock().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn report(&self, event: ProgressEvent<'_>) {
        self.events
            .lock()
            .push((event.phase.to_string(), event.item.to_string(), event.outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::default();
        sink.report(ProgressEvent {
            phase: "parse",
            item: "a.cs",
            outcome: ProgressOutcome::Ok,
        });
        sink.report(ProgressEvent {
            phase: "parse",
            item: "b.cs",
            outcome: ProgressOutcome::Failed,
        });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, "a.cs");
        assert_eq!(events[1].2, ProgressOutcome::Failed);
    }
}
