use serde_json::Value;

use crate::breakpoints::Breakpoint;
use crate::logging::{LogLevel, Logger, TARGET_INSTANCE, emit_to, json_str};
use crate::overflow::OverflowTarget;
use crate::registry::{SlotMeta, SlotRegistry, merge_meta};
use crate::size::{ResolvedSizeMap, SizeDescriptor, SizeResolver, SlotSizeMap, merge_size_maps};
use crate::tokens::TokenResolver;

use super::SlotFrame;

pub const DEFAULT_VARIANT: &str = "default";

/// How an instance sizes itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotSizing {
    /// Registry (or inherited) sizes with these per-breakpoint overrides on top.
    Overrides(SlotSizeMap),
    /// No fixed box; the slot takes the size of its content.
    Content,
}

impl Default for SlotSizing {
    fn default() -> Self {
        SlotSizing::Overrides(SlotSizeMap::new())
    }
}

/// Values an active edit session layers over an instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotOverrides {
    pub sizes: Option<SlotSizeMap>,
    pub variant: Option<String>,
    pub props: Option<Value>,
}

/// One occurrence of a named slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInstance {
    slot_key: String,
    inherit: bool,
    sizing: SlotSizing,
    variant: Option<String>,
    editable_id: Option<String>,
    props: Option<Value>,
}

impl SlotInstance {
    pub fn new(slot_key: impl Into<String>) -> Self {
        Self {
            slot_key: slot_key.into(),
            inherit: false,
            sizing: SlotSizing::default(),
            variant: None,
            editable_id: None,
            props: None,
        }
    }

    /// Take sizes and meta from the nearest enclosing slot instead of the registry.
    pub fn inherit(mut self) -> Self {
        self.inherit = true;
        self
    }

    pub fn sizes(mut self, overrides: SlotSizeMap) -> Self {
        self.sizing = SlotSizing::Overrides(overrides);
        self
    }

    pub fn content_sized(mut self) -> Self {
        self.sizing = SlotSizing::Content;
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Blank ids leave the instance read-only.
    pub fn editable(mut self, editable_id: impl Into<String>) -> Self {
        let id = editable_id.into();
        self.editable_id = (!id.trim().is_empty()).then_some(id);
        self
    }

    pub fn props(mut self, props: Value) -> Self {
        self.props = Some(props);
        self
    }

    pub fn slot_key(&self) -> &str {
        &self.slot_key
    }

    pub fn inherits(&self) -> bool {
        self.inherit
    }

    pub fn sizing(&self) -> &SlotSizing {
        &self.sizing
    }

    pub fn size_overrides(&self) -> Option<&SlotSizeMap> {
        match &self.sizing {
            SlotSizing::Overrides(map) => Some(map),
            SlotSizing::Content => None,
        }
    }

    pub fn variant_prop(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn editable_id(&self) -> Option<&str> {
        self.editable_id.as_deref()
    }

    pub fn props_json(&self) -> Option<&Value> {
        self.props.as_ref()
    }

    /// Meta as seen by this instance: the parent's meta underneath when inheriting.
    pub fn effective_meta(&self, registry: &SlotRegistry, parent: Option<&SlotFrame>) -> SlotMeta {
        let own = registry
            .get(&self.slot_key)
            .map(|definition| definition.meta.clone())
            .unwrap_or_default();
        match parent.filter(|_| self.inherit) {
            Some(parent) => merge_meta(&parent.meta, &own),
            None => own,
        }
    }

    pub fn resolve(
        &self,
        env: &ResolveEnv<'_>,
        parent: Option<&SlotFrame>,
        editing: Option<&SlotOverrides>,
    ) -> ResolvedSlot {
        let meta = self.effective_meta(env.registry, parent);
        let default_variant = meta
            .default_variant
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VARIANT.to_string());

        let sizes = self
            .size_overrides()
            .map(|overrides| self.merged_sizes(env, parent, overrides, editing));
        let size = sizes
            .as_ref()
            .map(|map| env.resolver.resolve(env.active, map))
            .unwrap_or_else(SizeDescriptor::fallback);

        let variant = editing
            .and_then(|e| e.variant.clone())
            .or_else(|| self.variant.clone())
            .unwrap_or_else(|| default_variant.clone());
        let props = editing
            .and_then(|e| e.props.clone())
            .or_else(|| self.props.clone());

        ResolvedSlot {
            slot_key: self.slot_key.clone(),
            breakpoint: env.active,
            inherited: self.inherit && parent.is_some(),
            sizes,
            size,
            meta,
            variant,
            default_variant,
            editable_id: self.editable_id.clone(),
            props,
        }
    }

    fn merged_sizes(
        &self,
        env: &ResolveEnv<'_>,
        parent: Option<&SlotFrame>,
        overrides: &SlotSizeMap,
        editing: Option<&SlotOverrides>,
    ) -> ResolvedSizeMap {
        let inherited = parent.filter(|_| self.inherit).map(|p| p.sizes.to_size_map());
        if self.inherit && inherited.is_none() && env.diagnostics {
            emit_to(
                env.logger,
                LogLevel::Warn,
                TARGET_INSTANCE,
                "inherit_without_parent",
                [json_str("slot", self.slot_key.as_str())],
            );
        }

        let base = match inherited {
            Some(map) => Some(map),
            None => env.registry.get(&self.slot_key).map(|d| d.sizes.clone()),
        };
        if base.is_none() && env.diagnostics {
            emit_to(
                env.logger,
                LogLevel::Warn,
                TARGET_INSTANCE,
                "unknown_slot",
                [json_str("slot", self.slot_key.as_str())],
            );
        }

        let combined = match editing.and_then(|e| e.sizes.as_ref()) {
            Some(draft) => overrides.overlay(draft),
            None => overrides.clone(),
        };
        merge_size_maps(&base.unwrap_or_default(), &combined, env.tokens)
    }
}

/// Everything shared across instances that resolution reads.
pub struct ResolveEnv<'a> {
    pub registry: &'a SlotRegistry,
    pub active: Breakpoint,
    pub resolver: SizeResolver,
    pub tokens: &'a dyn TokenResolver,
    pub logger: Option<&'a Logger>,
    pub diagnostics: bool,
}

/// A slot instance after resolution for one breakpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlot {
    pub slot_key: String,
    pub breakpoint: Breakpoint,
    /// `None` for content-sized slots.
    pub sizes: Option<ResolvedSizeMap>,
    pub size: SizeDescriptor,
    pub meta: SlotMeta,
    pub variant: String,
    pub default_variant: String,
    pub editable_id: Option<String>,
    pub props: Option<Value>,
    pub inherited: bool,
}

impl ResolvedSlot {
    pub fn is_content_sized(&self) -> bool {
        self.sizes.is_none()
    }

    pub fn label(&self) -> &str {
        self.meta.label.as_deref().unwrap_or(&self.slot_key)
    }

    pub fn variant_label(&self) -> Option<&str> {
        self.meta.variant_label(&self.variant)
    }

    /// Frame pushed for nested instances.
    pub fn frame(&self) -> SlotFrame {
        SlotFrame {
            slot_key: self.slot_key.clone(),
            sizes: self.sizes.clone().unwrap_or_default(),
            meta: self.meta.clone(),
            variant: self.variant.clone(),
            editable_id: self.editable_id.clone(),
            props: self.props.clone(),
        }
    }

    pub fn overflow_target(&self) -> OverflowTarget {
        if self.is_content_sized() {
            OverflowTarget::content_sized(&self.slot_key, self.breakpoint)
        } else {
            OverflowTarget::new(&self.slot_key, self.breakpoint, &self.size)
        }
    }
}
