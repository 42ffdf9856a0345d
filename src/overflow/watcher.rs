use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::breakpoints::Breakpoint;
use crate::logging::{LogLevel, Logger, TARGET_OVERFLOW, current_ms, emit_to, json_kv, json_str};
use crate::metrics::{SharedMetrics, SlotMetrics, record_with};
use crate::size::SizeDescriptor;

use super::{BoxMetrics, ElementId, Observation, ResizeHub};

/// Scroll may exceed client extent by this much before it counts as overflow.
pub const OVERFLOW_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowAxes {
    pub inline: bool,
    pub block: bool,
}

/// `None` when content fits within tolerance on both axes.
pub fn detect_overflow(metrics: &BoxMetrics) -> Option<OverflowAxes> {
    let inline = metrics.scroll_width - metrics.client_width > OVERFLOW_TOLERANCE;
    let block = metrics.scroll_height - metrics.client_height > OVERFLOW_TOLERANCE;
    (inline || block).then_some(OverflowAxes { inline, block })
}

/// What a watched slot is allowed to occupy at the current breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowTarget {
    pub slot_key: String,
    pub breakpoint: Breakpoint,
    pub inline_budget: String,
    pub block_budget: String,
    pub content_sizing: bool,
}

impl OverflowTarget {
    pub fn new(slot_key: impl Into<String>, breakpoint: Breakpoint, size: &SizeDescriptor) -> Self {
        Self {
            slot_key: slot_key.into(),
            breakpoint,
            inline_budget: size.inline.clone(),
            block_budget: size.block.clone(),
            content_sizing: false,
        }
    }

    /// A slot with no fixed box; never watched.
    pub fn content_sized(slot_key: impl Into<String>, breakpoint: Breakpoint) -> Self {
        Self {
            slot_key: slot_key.into(),
            breakpoint,
            inline_budget: "auto".into(),
            block_budget: "auto".into(),
            content_sizing: true,
        }
    }
}

/// Diagnostic emitted the first time a slot overflows at a breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverflowEvent {
    pub slot_key: String,
    pub breakpoint: Breakpoint,
    pub inline_budget: String,
    pub block_budget: String,
    pub inline_overflow: bool,
    pub block_overflow: bool,
    pub timestamp: u64,
}

impl OverflowEvent {
    /// `<breakpoint>:<timestamp>`, the key editors list events under.
    pub fn id(&self) -> String {
        format!("{}:{}", self.breakpoint, self.timestamp)
    }
}

struct WatcherCore {
    warned: Mutex<HashSet<(String, Breakpoint)>>,
    logger: Option<Logger>,
    metrics: Option<SharedMetrics>,
}

impl WatcherCore {
    fn check(&self, target: &OverflowTarget, metrics: &BoxMetrics) -> Option<OverflowEvent> {
        let axes = detect_overflow(metrics)?;
        let first = self
            .warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((target.slot_key.clone(), target.breakpoint));
        if !first {
            return None;
        }

        let event = OverflowEvent {
            slot_key: target.slot_key.clone(),
            breakpoint: target.breakpoint,
            inline_budget: target.inline_budget.clone(),
            block_budget: target.block_budget.clone(),
            inline_overflow: axes.inline,
            block_overflow: axes.block,
            timestamp: u64::try_from(current_ms()).unwrap_or(u64::MAX),
        };
        emit_to(
            self.logger.as_ref(),
            LogLevel::Warn,
            TARGET_OVERFLOW,
            "slot_overflow",
            [
                json_str("slot", event.slot_key.as_str()),
                json_str("breakpoint", event.breakpoint.as_str()),
                json_str("inline_budget", event.inline_budget.as_str()),
                json_str("block_budget", event.block_budget.as_str()),
                json_kv("inline_overflow", axes.inline),
                json_kv("block_overflow", axes.block),
            ],
        );
        record_with(self.metrics.as_ref(), SlotMetrics::record_overflow_warning);
        Some(event)
    }
}

/// Watches slot elements through a shared [`ResizeHub`] and reports each
/// `(slot, breakpoint)` overflow once per watcher lifetime.
///
/// The budget is shared by every instance of a slot name: two cards at `md`
/// produce one warning between them.
#[derive(Clone)]
pub struct OverflowWatcher {
    hub: ResizeHub,
    core: Arc<WatcherCore>,
    enabled: bool,
}

impl OverflowWatcher {
    pub fn new(hub: ResizeHub) -> Self {
        Self::with_observability(hub, true, None, None)
    }

    pub fn with_observability(
        hub: ResizeHub,
        enabled: bool,
        logger: Option<Logger>,
        metrics: Option<SharedMetrics>,
    ) -> Self {
        Self {
            hub,
            core: Arc::new(WatcherCore {
                warned: Mutex::new(HashSet::new()),
                logger,
                metrics,
            }),
            enabled,
        }
    }

    pub fn hub(&self) -> &ResizeHub {
        &self.hub
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start watching `element`. Returns `None` when diagnostics are off or the
    /// target is content sized; dropping the guard stops observation.
    pub fn watch<F>(
        &self,
        element: ElementId,
        target: OverflowTarget,
        on_overflow: F,
    ) -> Option<OverflowGuard>
    where
        F: Fn(OverflowEvent) + Send + Sync + 'static,
    {
        if !self.enabled || target.content_sizing {
            return None;
        }
        let core = Arc::clone(&self.core);
        let observation = self.hub.observe(element, move |metrics| {
            if let Some(event) = core.check(&target, &metrics) {
                on_overflow(event);
            }
        });
        Some(OverflowGuard {
            hub: self.hub.clone(),
            observation: Some(observation),
        })
    }

    /// Evaluate one measurement directly, without going through the hub.
    pub fn check(&self, target: &OverflowTarget, metrics: &BoxMetrics) -> Option<OverflowEvent> {
        if !self.enabled || target.content_sizing {
            return None;
        }
        self.core.check(target, metrics)
    }

    pub fn has_warned(&self, slot_key: &str, breakpoint: Breakpoint) -> bool {
        self.core
            .warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(slot_key.to_string(), breakpoint))
    }

    pub fn warned_count(&self) -> usize {
        self.core
            .warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Keeps an element observed; releases it on drop.
pub struct OverflowGuard {
    hub: ResizeHub,
    observation: Option<Observation>,
}

impl OverflowGuard {
    pub fn element(&self) -> Option<ElementId> {
        self.observation.map(|obs| obs.element())
    }

    pub fn release(mut self) {
        self.unobserve();
    }

    fn unobserve(&mut self) {
        if let Some(observation) = self.observation.take() {
            self.hub.unobserve(observation);
        }
    }
}

impl Drop for OverflowGuard {
    fn drop(&mut self) {
        self.unobserve();
    }
}
