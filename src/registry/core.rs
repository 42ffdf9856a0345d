use std::collections::{BTreeMap, BTreeSet};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::breakpoints::Breakpoint;
use crate::size::SlotSizeMap;

/// Link back to the design source for a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figma_component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figma_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figma_url: Option<String>,
}

impl DesignRef {
    fn merged(&self, overrides: &DesignRef) -> DesignRef {
        DesignRef {
            figma_component: overrides
                .figma_component
                .clone()
                .or_else(|| self.figma_component.clone()),
            figma_node_id: overrides
                .figma_node_id
                .clone()
                .or_else(|| self.figma_node_id.clone()),
            figma_url: overrides.figma_url.clone().or_else(|| self.figma_url.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl VariantMeta {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}

/// Descriptive metadata carried alongside a slot's sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlotMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design: Option<DesignRef>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<String, VariantMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_variant: Option<String>,
}

impl SlotMeta {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn variant_label(&self, variant: &str) -> Option<&str> {
        self.variants.get(variant).and_then(|v| v.label.as_deref())
    }
}

/// Layer `overrides` over `base`.
///
/// Scalars in `overrides` win when present; variants and design references
/// merge by key; tags are unioned in first-seen order.
pub fn merge_meta(base: &SlotMeta, overrides: &SlotMeta) -> SlotMeta {
    let mut variants = base.variants.clone();
    variants.extend(
        overrides
            .variants
            .iter()
            .map(|(name, meta)| (name.clone(), meta.clone())),
    );

    let design = match (&base.design, &overrides.design) {
        (Some(b), Some(o)) => Some(b.merged(o)),
        (b, o) => o.clone().or_else(|| b.clone()),
    };

    let mut tags: Vec<String> = Vec::with_capacity(base.tags.len() + overrides.tags.len());
    for tag in base.tags.iter().chain(&overrides.tags) {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    SlotMeta {
        label: overrides.label.clone().or_else(|| base.label.clone()),
        description: overrides
            .description
            .clone()
            .or_else(|| base.description.clone()),
        design,
        variants,
        tags,
        default_variant: overrides
            .default_variant
            .clone()
            .or_else(|| base.default_variant.clone()),
    }
}

/// A registry entry: sizes, metadata and an optional parent to extend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotDefinition {
    pub sizes: SlotSizeMap,
    #[serde(skip_serializing_if = "is_default_meta")]
    pub meta: SlotMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

fn is_default_meta(meta: &SlotMeta) -> bool {
    *meta == SlotMeta::default()
}

impl SlotDefinition {
    pub fn new(sizes: SlotSizeMap) -> Self {
        Self {
            sizes,
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, meta: SlotMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// `parent` underneath, `self` on top.
    fn layered_over(&self, parent: &SlotDefinition) -> SlotDefinition {
        SlotDefinition {
            sizes: parent.sizes.overlay(&self.sizes),
            meta: merge_meta(&parent.meta, &self.meta),
            extends: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct FullDefinition {
    sizes: SlotSizeMap,
    meta: SlotMeta,
    extends: Option<String>,
}

impl Default for FullDefinition {
    fn default() -> Self {
        Self {
            sizes: SlotSizeMap::new(),
            meta: SlotMeta::default(),
            extends: None,
        }
    }
}

// Entries may be written either as `{ sizes, meta, extends }` or as a bare
// breakpoint map.
impl<'de> Deserialize<'de> for SlotDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let is_full = value
            .as_object()
            .is_some_and(|obj| ["sizes", "meta", "extends"].iter().any(|k| obj.contains_key(*k)));

        if is_full {
            let full: FullDefinition = serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(SlotDefinition {
                sizes: full.sizes,
                meta: full.meta,
                extends: full.extends,
            })
        } else {
            let sizes: SlotSizeMap = serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(SlotDefinition::new(sizes))
        }
    }
}

/// Named slot definitions. Merges always produce a fresh registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotRegistry {
    entries: BTreeMap<String, SlotDefinition>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, definition: SlotDefinition) -> Self {
        self.insert(name, definition);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: SlotDefinition) {
        self.entries.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&SlotDefinition> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotDefinition)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deep-merge `overrides` into `base`.
    ///
    /// Every slot named on either side is resolved: `extends` chains are
    /// flattened (cycles are cut where they close), then override sizes are
    /// layered per breakpoint and per field so partial overrides never erase
    /// base values. The result carries no `extends` links.
    pub fn merge(base: &SlotRegistry, overrides: &SlotRegistry) -> SlotRegistry {
        let mut merger = Merger {
            base,
            overrides,
            resolved: BTreeMap::new(),
            visiting: BTreeSet::new(),
        };

        let names: BTreeSet<&str> = base.names().chain(overrides.names()).collect();
        for name in names {
            merger.resolve(name);
        }

        SlotRegistry {
            entries: merger.resolved,
        }
    }
}

/// Parse a registry document, collecting a warning for each breakpoint key
/// that had to be dropped and each `extends` naming an unknown slot.
pub fn parse_registry(text: &str) -> crate::error::Result<(SlotRegistry, Vec<String>)> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(text)?;
    let mut warnings = Vec::new();
    for (name, entry) in &raw {
        let sizes = match entry.get("sizes") {
            Some(sizes) => Some(sizes),
            None if entry.get("meta").is_some() || entry.get("extends").is_some() => None,
            None => Some(entry),
        };
        let keys = sizes.and_then(Value::as_object).into_iter().flat_map(|map| map.keys());
        for key in keys {
            if key.parse::<Breakpoint>().is_err() {
                warnings.push(format!("slot `{name}`: unknown breakpoint `{key}` dropped"));
            }
        }
        if let Some(parent) = entry.get("extends").and_then(Value::as_str) {
            if !raw.contains_key(parent) {
                warnings.push(format!("slot `{name}`: extends unknown slot `{parent}`"));
            }
        }
    }
    let registry = serde_json::from_str(text)?;
    Ok((registry, warnings))
}

struct Merger<'a> {
    base: &'a SlotRegistry,
    overrides: &'a SlotRegistry,
    resolved: BTreeMap<String, SlotDefinition>,
    visiting: BTreeSet<String>,
}

impl Merger<'_> {
    fn resolve(&mut self, name: &str) -> Option<SlotDefinition> {
        if let Some(done) = self.resolved.get(name) {
            return Some(done.clone());
        }
        let (base, overrides) = (self.base, self.overrides);
        let base_entry = base.get(name);
        let override_entry = overrides.get(name);
        if base_entry.is_none() && override_entry.is_none() {
            return None;
        }
        if !self.visiting.insert(name.to_string()) {
            return None;
        }

        let mut definition = base_entry
            .map(|entry| SlotDefinition {
                extends: None,
                ..entry.clone()
            })
            .unwrap_or_default();

        if let Some(parent) = base_entry.and_then(|e| self.parent_of(name, e)) {
            definition = definition.layered_over(&parent);
        }

        if let Some(entry) = override_entry {
            if let Some(parent) = self.parent_of(name, entry) {
                definition = definition.layered_over(&parent);
            }
            let top = SlotDefinition {
                extends: None,
                ..entry.clone()
            };
            definition = top.layered_over(&definition);
        }

        self.visiting.remove(name);
        self.resolved.insert(name.to_string(), definition.clone());
        Some(definition)
    }

    fn parent_of(&mut self, name: &str, entry: &SlotDefinition) -> Option<SlotDefinition> {
        let parent = entry.extends.as_deref().filter(|p| *p != name)?;
        self.resolve(parent)
    }
}
