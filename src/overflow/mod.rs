//! Overflow diagnostics for fixed-size slots.

mod hub;
mod watcher;

pub use hub::{BoxMetrics, ElementId, Observation, ResizeHub};
pub use watcher::{
    OVERFLOW_TOLERANCE, OverflowAxes, OverflowEvent, OverflowGuard, OverflowTarget,
    OverflowWatcher, detect_overflow,
};
