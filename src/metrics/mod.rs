use std::sync::{Arc, Mutex};

use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;

/// Metrics handle shared between a runtime and everything it hands out.
pub type SharedMetrics = Arc<Mutex<SlotMetrics>>;

/// Apply `update` when metrics are enabled; a poisoned lock skips the update.
pub(crate) fn record_with<F>(metrics: Option<&SharedMetrics>, update: F)
where
    F: FnOnce(&mut SlotMetrics),
{
    if let Some(metrics) = metrics {
        if let Ok(mut guard) = metrics.lock() {
            update(&mut guard);
        }
    }
}

/// Counters accumulated by a [`crate::SlotRuntime`] and the sessions it hands out.
#[derive(Debug, Default, Clone)]
pub struct SlotMetrics {
    resolutions: u64,
    overflow_warnings: u64,
    draft_writes: u64,
    publishes: u64,
    publish_failures: u64,
    discards: u64,
}

impl SlotMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_resolution(&mut self) {
        self.resolutions = self.resolutions.saturating_add(1);
    }

    pub fn record_overflow_warning(&mut self) {
        self.overflow_warnings = self.overflow_warnings.saturating_add(1);
    }

    pub fn record_draft_write(&mut self) {
        self.draft_writes = self.draft_writes.saturating_add(1);
    }

    pub fn record_publish(&mut self, succeeded: bool) {
        if succeeded {
            self.publishes = self.publishes.saturating_add(1);
        } else {
            self.publish_failures = self.publish_failures.saturating_add(1);
        }
    }

    pub fn record_discard(&mut self) {
        self.discards = self.discards.saturating_add(1);
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            resolutions: self.resolutions,
            overflow_warnings: self.overflow_warnings,
            draft_writes: self.draft_writes,
            publishes: self.publishes,
            publish_failures: self.publish_failures,
            discards: self.discards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub resolutions: u64,
    pub overflow_warnings: u64,
    pub draft_writes: u64,
    pub publishes: u64,
    pub publish_failures: u64,
    pub discards: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("resolutions".to_string(), json!(self.resolutions));
        map.insert("overflow_warnings".to_string(), json!(self.overflow_warnings));
        map.insert("draft_writes".to_string(), json!(self.draft_writes));
        map.insert("publishes".to_string(), json!(self.publishes));
        map.insert("publish_failures".to_string(), json!(self.publish_failures));
        map.insert("discards".to_string(), json!(self.discards));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "slot_metrics", self.as_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let mut metrics = SlotMetrics::new();
        metrics.record_resolution();
        metrics.record_resolution();
        metrics.record_publish(true);
        metrics.record_publish(false);
        metrics.record_draft_write();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.resolutions, 2);
        assert_eq!(snapshot.publishes, 1);
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.draft_writes, 1);

        let event = snapshot.to_log_event("room::slots.metrics");
        assert_eq!(event.message, "slot_metrics");
        assert_eq!(event.field("publish_failures"), Some(&json!(1)));
    }
}
