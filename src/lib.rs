//! Responsive layout slots.
//!
//! Named slots carry a size budget per breakpoint. A [`SlotRuntime`] tracks the
//! active breakpoint, resolves slot instances against a merged registry, and
//! hands out draft sessions so authors can edit sizes, variants and props in
//! place before publishing them.

pub mod breakpoints;
pub mod editing;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod overflow;
pub mod registry;
pub mod render;
pub mod runtime;
pub mod size;
pub mod slot;
pub mod tokens;

pub use breakpoints::{Breakpoint, BreakpointOracle, BreakpointQuery, MediaQuery, MediaQueryHub};
pub use editing::{
    DraftStore, EditModeConfig, EditModeController, EditModeState, EditableDraft, EditingContext,
    FocusTarget, GraphqlPublisher, GraphqlPublisherConfig, KeyValueStore, MemoryStore,
    SessionStatus, SharedStore, Shortcut, SlotDraftSession, SlotEditingProps, SlotPublisher,
};
pub use error::{PublishBlocked, PublishError, Result, SlotError, StoreError};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{MetricSnapshot, SharedMetrics, SlotMetrics};
pub use overflow::{BoxMetrics, ElementId, OverflowEvent, OverflowWatcher, ResizeHub};
pub use registry::{SlotDefinition, SlotMeta, SlotRegistry, base_registry};
pub use render::{EditingFlags, SlotMarkup, SlotRenderer};
pub use runtime::{SlotConfig, SlotHost, SlotRuntime};
pub use size::{Dimension, PartialSize, SizeDescriptor, SizeValue, SlotSizeMap};
pub use slot::{ResolvedSlot, SlotContext, SlotInstance};
pub use tokens::{TokenResolver, TokenTable};
