use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::breakpoints::{
    Breakpoint, BreakpointOracle, BreakpointQuery, MediaQueryHub, default_breakpoints,
};
use crate::editing::{
    DraftStore, EditModeConfig, EditModeController, EditingContext, MemoryStore, SharedStore,
    SlotDraftSession, SlotEditingProps, SlotPublisher,
};
use crate::error::Result;
use crate::logging::{LogLevel, Logger, TARGET_REGISTRY, emit_to, json_str};
use crate::metrics::{SharedMetrics, SlotMetrics, record_with};
use crate::overflow::{ElementId, OverflowGuard, OverflowWatcher, ResizeHub};
use crate::registry::{SlotRegistry, base_registry, parse_registry};
use crate::render::{EditingFlags, SlotMarkup, SlotRenderer};
use crate::size::SizeResolver;
use crate::slot::{ResolveEnv, ResolvedSlot, SlotContext, SlotInstance};
use crate::tokens::{NoTokens, TokenResolver};

/// Configuration knobs for a slot runtime.
#[derive(Clone)]
pub struct SlotConfig {
    /// Tier used when no media query matches and for keys outside the known set.
    pub default_breakpoint: Breakpoint,
    /// Media query per tier, evaluated against the host viewport.
    pub breakpoints: Vec<BreakpointQuery>,
    /// Non-production diagnostics: inheritance/registry warnings and overflow watching.
    pub diagnostics: bool,
    /// Optional structured logger used by the runtime and everything it hands out.
    pub logger: Option<Logger>,
    /// Metrics accumulator used for snapshots.
    pub metrics: Option<SharedMetrics>,
    /// Minimum interval between automatic metrics snapshots. Zero disables them.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
    pub edit_mode: EditModeConfig,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            default_breakpoint: Breakpoint::Md,
            breakpoints: default_breakpoints(),
            diagnostics: cfg!(debug_assertions),
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "room::slots.metrics".to_string(),
            edit_mode: EditModeConfig::default(),
        }
    }
}

impl SlotConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(SlotMetrics::new())));
        }
    }

    /// Disable metrics collection and prevent further snapshots.
    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<SharedMetrics> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Collaborators supplied by the host environment.
#[derive(Clone)]
pub struct SlotHost {
    pub media: MediaQueryHub,
    pub resize: ResizeHub,
    pub store: SharedStore,
    pub publisher: Option<Arc<dyn SlotPublisher>>,
}

impl Default for SlotHost {
    fn default() -> Self {
        Self {
            media: MediaQueryHub::new(),
            resize: ResizeHub::new(),
            store: Arc::new(MemoryStore::new()),
            publisher: None,
        }
    }
}

/// Provider every slot resolves against: the merged registry, the active
/// breakpoint, and the shared editing collaborators.
pub struct SlotRuntime {
    config: SlotConfig,
    registry: SlotRegistry,
    tokens: Arc<dyn TokenResolver>,
    media: MediaQueryHub,
    oracle: BreakpointOracle,
    overflow: OverflowWatcher,
    renderer: SlotRenderer,
    editing: EditingContext,
    last_metrics_emit: Mutex<Option<Instant>>,
}

impl SlotRuntime {
    /// `registry` is merged over the base presets.
    pub fn new(registry: &SlotRegistry, host: SlotHost, config: SlotConfig) -> Self {
        let logger = config.logger.clone();
        let metrics = config.metrics_handle();
        let oracle = BreakpointOracle::attach_with_logger(
            &host.media,
            &config.breakpoints,
            config.default_breakpoint,
            logger.clone(),
        );
        let overflow = OverflowWatcher::with_observability(
            host.resize,
            config.diagnostics,
            logger.clone(),
            metrics.clone(),
        );
        let controller = EditModeController::with_store(
            config.edit_mode.clone(),
            Some(Arc::clone(&host.store)),
            logger.clone(),
        );
        let drafts = DraftStore::with_observability(host.store, logger.clone(), metrics.clone());
        let editing = EditingContext {
            controller,
            drafts,
            publisher: host.publisher,
            logger,
            metrics,
        };

        Self {
            registry: SlotRegistry::merge(&base_registry(), registry),
            tokens: Arc::new(NoTokens),
            media: host.media,
            oracle,
            overflow,
            renderer: SlotRenderer::with_default(),
            editing,
            config,
            last_metrics_emit: Mutex::new(None),
        }
    }

    /// Build from a JSON registry document. Dropped configuration is logged,
    /// never fatal; only a document that is not a JSON object fails.
    pub fn from_json(text: &str, host: SlotHost, config: SlotConfig) -> Result<Self> {
        let (registry, warnings) = parse_registry(text)?;
        for warning in warnings {
            emit_to(
                config.logger.as_ref(),
                LogLevel::Warn,
                TARGET_REGISTRY,
                "registry_entry_dropped",
                [json_str("detail", warning)],
            );
        }
        Ok(Self::new(&registry, host, config))
    }

    pub fn with_tokens<T>(mut self, tokens: T) -> Self
    where
        T: TokenResolver + 'static,
    {
        self.tokens = Arc::new(tokens);
        self
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    pub fn media(&self) -> &MediaQueryHub {
        &self.media
    }

    pub fn oracle(&self) -> &BreakpointOracle {
        &self.oracle
    }

    pub fn active_breakpoint(&self) -> Breakpoint {
        self.oracle.active()
    }

    pub fn overflow(&self) -> &OverflowWatcher {
        &self.overflow
    }

    pub fn controller(&self) -> &EditModeController {
        &self.editing.controller
    }

    pub fn editing(&self) -> &EditingContext {
        &self.editing
    }

    pub fn renderer_mut(&mut self) -> &mut SlotRenderer {
        &mut self.renderer
    }

    pub fn metrics_handle(&self) -> Option<SharedMetrics> {
        self.config.metrics_handle()
    }

    fn env(&self) -> ResolveEnv<'_> {
        ResolveEnv {
            registry: &self.registry,
            active: self.oracle.active(),
            resolver: SizeResolver::new(self.config.default_breakpoint),
            tokens: self.tokens.as_ref(),
            logger: self.config.logger.as_ref(),
            diagnostics: self.config.diagnostics,
        }
    }

    /// Resolve `instance` under the innermost frame of `ctx`.
    pub fn resolve(&self, instance: &SlotInstance, ctx: &SlotContext) -> ResolvedSlot {
        self.resolve_with(instance, ctx, None)
    }

    /// Resolve with the draft of `session` layered over the instance.
    pub fn resolve_with(
        &self,
        instance: &SlotInstance,
        ctx: &SlotContext,
        session: Option<&SlotDraftSession>,
    ) -> ResolvedSlot {
        let overrides = session.map(SlotDraftSession::slot_overrides);
        let resolved = instance.resolve(&self.env(), ctx.parent(), overrides.as_ref());
        record_with(self.config.metrics.as_ref(), SlotMetrics::record_resolution);
        self.maybe_emit_metrics();
        resolved
    }

    fn editing_props(&self, instance: &SlotInstance, ctx: &SlotContext) -> SlotEditingProps {
        let meta = instance.effective_meta(&self.registry, ctx.parent());
        let default_variant = meta
            .default_variant
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| crate::slot::DEFAULT_VARIANT.to_string());
        SlotEditingProps::from_instance(instance, default_variant)
    }

    /// Mount a draft session for `instance`. Read-only instances get a
    /// pass-through session.
    pub fn session_for(&self, instance: &SlotInstance, ctx: &SlotContext) -> SlotDraftSession {
        SlotDraftSession::mount(self.editing.clone(), self.editing_props(instance, ctx))
    }

    /// Feed `instance`'s current props into an existing session.
    pub fn sync_session(
        &self,
        session: &SlotDraftSession,
        instance: &SlotInstance,
        ctx: &SlotContext,
    ) {
        session.set_props(self.editing_props(instance, ctx));
    }

    /// Resolve `instance`, then run `body` with its frame pushed so nested
    /// instances can inherit from it.
    pub fn mount<R>(
        &self,
        instance: &SlotInstance,
        ctx: &mut SlotContext,
        session: Option<&SlotDraftSession>,
        body: impl FnOnce(&ResolvedSlot, &mut SlotContext) -> R,
    ) -> R {
        let resolved = self.resolve_with(instance, ctx, session);
        ctx.scoped(resolved.frame(), |inner| body(&resolved, inner))
    }

    pub fn render(&self, resolved: &ResolvedSlot, session: Option<&SlotDraftSession>) -> SlotMarkup {
        let flags = session
            .map(SlotDraftSession::editing_flags)
            .unwrap_or_else(EditingFlags::default);
        self.renderer.render(resolved, flags)
    }

    /// Watch `element` for overflow of `resolved`'s budget. Events go to the
    /// session's history when one is given.
    pub fn watch_overflow(
        &self,
        element: ElementId,
        resolved: &ResolvedSlot,
        session: Option<&SlotDraftSession>,
    ) -> Option<OverflowGuard> {
        let session = session.cloned();
        self.overflow
            .watch(element, resolved.overflow_target(), move |event| {
                if let Some(session) = &session {
                    session.record_overflow(event);
                }
            })
    }

    /// Emit a metrics snapshot now, regardless of the interval.
    pub fn emit_metrics_snapshot(&self) {
        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let target = self.config.metrics_target.as_str();
                let _ = logger.log_event(guard.snapshot().to_log_event(target));
            }
        }
    }

    fn maybe_emit_metrics(&self) {
        if self.config.metrics.is_none() || self.config.metrics_interval.is_zero() {
            return;
        }

        let now = Instant::now();
        {
            let mut last = self
                .last_metrics_emit
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match *last {
                Some(previous) if now.duration_since(previous) < self.config.metrics_interval => {
                    return;
                }
                _ => *last = Some(now),
            }
        }
        self.emit_metrics_snapshot();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::overflow::BoxMetrics;
    use crate::registry::SlotDefinition;
    use crate::size::{Dimension, PartialSize, SlotSizeMap};

    fn config_with(sink: &MemorySink) -> SlotConfig {
        let mut config = SlotConfig {
            diagnostics: true,
            logger: Some(Logger::new(sink.clone())),
            ..SlotConfig::default()
        };
        config.enable_metrics();
        config
    }

    fn runtime_at(width: f32, sink: &MemorySink) -> SlotRuntime {
        let host = SlotHost {
            media: MediaQueryHub::with_viewport_width(width),
            ..SlotHost::default()
        };
        SlotRuntime::new(&SlotRegistry::new(), host, config_with(sink))
    }

    #[test]
    fn active_breakpoint_follows_the_viewport() {
        let sink = MemorySink::new();
        let runtime = runtime_at(800.0, &sink);
        assert_eq!(runtime.active_breakpoint(), Breakpoint::Md);
        runtime.media().set_viewport_width(1300.0);
        assert_eq!(runtime.active_breakpoint(), Breakpoint::Xl);
        runtime.media().set_viewport_width(300.0);
        assert_eq!(runtime.active_breakpoint(), Breakpoint::Xs);
    }

    #[test]
    fn card_resolves_from_presets() {
        let sink = MemorySink::new();
        let runtime = runtime_at(800.0, &sink);
        let resolved = runtime.resolve(&SlotInstance::new("catalog.card"), &SlotContext::new());
        assert_eq!(resolved.size.get(Dimension::Inline), "22rem");
        assert_eq!(resolved.size.get(Dimension::Block), "26rem");
        assert_eq!(resolved.size.get(Dimension::MaxInline), "none");
    }

    #[test]
    fn caller_registry_overrides_presets_per_field() {
        let sink = MemorySink::new();
        let overrides = SlotRegistry::new().with(
            "catalog.card",
            SlotDefinition::new(
                SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().block("30rem")),
            ),
        );
        let host = SlotHost {
            media: MediaQueryHub::with_viewport_width(800.0),
            ..SlotHost::default()
        };
        let runtime = SlotRuntime::new(&overrides, host, config_with(&sink));
        let resolved = runtime.resolve(&SlotInstance::new("catalog.card"), &SlotContext::new());
        assert_eq!(resolved.size.get(Dimension::Inline), "22rem");
        assert_eq!(resolved.size.get(Dimension::Block), "30rem");
    }

    #[test]
    fn nested_instances_inherit_through_mount() {
        let sink = MemorySink::new();
        let runtime = runtime_at(800.0, &sink);
        let mut ctx = SlotContext::new();
        let outer = SlotInstance::new("catalog.card")
            .sizes(SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().inline("40rem")));

        let inner_size = runtime.mount(&outer, &mut ctx, None, |_, ctx| {
            let inner = SlotInstance::new("list.row").inherit();
            runtime.resolve(&inner, ctx).size
        });
        assert_eq!(inner_size.get(Dimension::Inline), "40rem");
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn registry_documents_log_dropped_entries() {
        let sink = MemorySink::new();
        let runtime = SlotRuntime::from_json(
            r#"{ "promo.tile": { "md": { "inline": "12rem" }, "jumbo": {} } }"#,
            SlotHost::default(),
            config_with(&sink),
        )
        .unwrap();
        assert!(runtime.registry().contains("promo.tile"));
        assert!(runtime.registry().contains("hero.banner"));
        assert_eq!(sink.count("registry_entry_dropped"), 1);
    }

    #[test]
    fn overflow_lands_in_the_session_history() {
        let sink = MemorySink::new();
        let runtime = runtime_at(800.0, &sink);
        let instance = SlotInstance::new("catalog.card").editable("card-1");
        let ctx = SlotContext::new();
        let session = runtime.session_for(&instance, &ctx);
        let resolved = runtime.resolve_with(&instance, &ctx, Some(&session));

        let element = runtime.overflow().hub().allocate_element();
        let guard = runtime
            .watch_overflow(element, &resolved, Some(&session))
            .unwrap();
        runtime
            .overflow()
            .hub()
            .report(element, BoxMetrics::new(400.0, 352.0, 100.0, 100.0));

        let events = session.overflow_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].inline_budget, "22rem");
        guard.release();
        assert!(!runtime.overflow().hub().is_observed(element));
    }

    #[test]
    fn metrics_snapshots_are_logged() {
        let sink = MemorySink::new();
        let runtime = runtime_at(800.0, &sink);
        runtime.resolve(&SlotInstance::new("hero.banner"), &SlotContext::new());
        runtime.resolve(&SlotInstance::new("hero.banner"), &SlotContext::new());
        runtime.emit_metrics_snapshot();

        let snapshot = runtime.metrics_handle().unwrap().lock().unwrap().snapshot();
        assert_eq!(snapshot.resolutions, 2);
        // one throttled snapshot after the first resolution plus the forced one
        assert_eq!(sink.count("slot_metrics"), 2);
    }
}
